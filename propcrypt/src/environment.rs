//! Ordered set of property sources. Index 0 has the highest precedence: the
//! first source that holds a key supplies its value.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexSet;

use crate::source::{PropertyError, PropertySource};

#[derive(Default)]
pub struct Environment {
    sources: Vec<Arc<dyn PropertySource>>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a source that overrides every source already present.
    pub fn add_first(&mut self, source: Arc<dyn PropertySource>) {
        self.sources.insert(0, source);
    }

    /// Adds a source that every source already present overrides.
    pub fn add_last(&mut self, source: Arc<dyn PropertySource>) {
        self.sources.push(source);
    }

    /// Replaces the source called `name` in place. Returns false if absent.
    pub fn replace(&mut self, name: &str, source: Arc<dyn PropertySource>) -> bool {
        match self.sources.iter().position(|s| s.name() == name) {
            Some(index) => {
                self.sources[index] = source;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Arc<dyn PropertySource>> {
        let index = self.sources.iter().position(|s| s.name() == name)?;
        Some(self.sources.remove(index))
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn PropertySource>> {
        self.sources.iter().find(|s| s.name() == name)
    }

    /// Sources in precedence order.
    pub fn sources(&self) -> &[Arc<dyn PropertySource>] {
        &self.sources
    }

    pub(crate) fn sources_mut(&mut self) -> &mut [Arc<dyn PropertySource>] {
        &mut self.sources
    }

    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    /// Resolved value of `key`. Lower-precedence sources are never consulted
    /// once a higher one holds the key, so their values are never decrypted.
    pub fn property(&self, key: &str) -> Result<Option<String>, PropertyError> {
        for source in &self.sources {
            if let Some(value) = source.property(key)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    pub fn property_or(&self, key: &str, default: &str) -> Result<String, PropertyError> {
        Ok(self.property(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// Stored value of `key` with no decryption applied, even if sources are wrapped.
    pub fn raw_property(&self, key: &str) -> Option<String> {
        self.sources.iter().find_map(|source| source.raw_property(key))
    }

    pub fn contains_property(&self, key: &str) -> bool {
        self.raw_property(key).is_some()
    }

    /// Union of keys across all sources, in first-seen precedence order.
    pub fn property_names(&self) -> Vec<String> {
        let mut names = IndexSet::new();
        for source in &self.sources {
            names.extend(source.property_names());
        }
        names.into_iter().collect()
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("sources", &self.source_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::Environment;
    use crate::source::{MapPropertySource, PropertySource};
    use std::sync::Arc;

    fn source(name: &str, pairs: &[(&str, &str)]) -> Arc<dyn PropertySource> {
        Arc::new(MapPropertySource::from_pairs(name, pairs.iter().copied()))
    }

    #[test]
    fn first_source_wins() {
        let mut env = Environment::new();
        env.add_last(source("defaults", &[("db.user", "sa"), ("db.pass", "x")]));
        env.add_first(source("overrides", &[("db.user", "admin")]));

        assert_eq!(env.source_names(), vec!["overrides", "defaults"]);
        assert_eq!(env.property("db.user").unwrap().as_deref(), Some("admin"));
        assert_eq!(env.property("db.pass").unwrap().as_deref(), Some("x"));
        assert_eq!(env.property("db.url").unwrap(), None);
        assert_eq!(env.property_or("db.url", "jdbc").unwrap(), "jdbc");
    }

    #[test]
    fn replace_keeps_position() {
        let mut env = Environment::new();
        env.add_last(source("a", &[("k", "1")]));
        env.add_last(source("b", &[("k", "2")]));
        assert!(env.replace("a", source("a", &[])));
        assert!(!env.replace("missing", source("c", &[])));
        assert_eq!(env.source_names(), vec!["a", "b"]);
        assert_eq!(env.property("k").unwrap().as_deref(), Some("2"));
        assert!(env.remove("b").is_some());
        assert!(!env.contains_property("k"));
    }

    #[test]
    fn property_names_are_deduplicated() {
        let mut env = Environment::new();
        env.add_last(source("a", &[("x", "1"), ("y", "2")]));
        env.add_last(source("b", &[("y", "3"), ("z", "4")]));
        assert_eq!(env.property_names(), vec!["x", "y", "z"]);
        assert!(env.get("b").is_some());
    }
}
