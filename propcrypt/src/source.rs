//! Property sources: named, read-only key/value providers that make up an
//! [`crate::environment::Environment`].

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;

use crate::crypto::CipherError;

/// Failure reading a single property.
#[derive(Debug, Error)]
pub enum PropertyError {
    #[error("unable to decrypt property '{key}': {source}")]
    Decryption {
        key: String,
        #[source]
        source: CipherError,
    },
}

impl PropertyError {
    pub fn key(&self) -> &str {
        match self {
            PropertyError::Decryption { key, .. } => key,
        }
    }
}

/// Failure loading a source from disk.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("property file unreadable: {0}")]
    Io(String),
    #[error("property file parse failed: {0}")]
    Parse(String),
    #[error("invalid property file structure: {0}")]
    InvalidShape(String),
}

/// Lookup capability shared by raw sources and decrypting wrappers.
pub trait PropertySource: Send + Sync {
    fn name(&self) -> &str;

    /// The value exactly as stored, without any decryption.
    fn raw_property(&self, key: &str) -> Option<String>;

    /// The value as application code should see it.
    fn property(&self, key: &str) -> Result<Option<String>, PropertyError> {
        Ok(self.raw_property(key))
    }

    fn property_names(&self) -> Vec<String>;

    /// True for sources that already decrypt on read.
    fn is_decrypting(&self) -> bool {
        false
    }
}

/// In-memory source with insertion-ordered keys.
#[derive(Debug, Clone)]
pub struct MapPropertySource {
    name: String,
    properties: IndexMap<String, String>,
}

impl MapPropertySource {
    pub fn new(name: impl Into<String>, properties: IndexMap<String, String>) -> Self {
        Self {
            name: name.into(),
            properties,
        }
    }

    pub fn from_pairs<K, V>(name: impl Into<String>, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let properties = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::new(name, properties)
    }
}

impl PropertySource for MapPropertySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn raw_property(&self, key: &str) -> Option<String> {
        self.properties.get(key).cloned()
    }

    fn property_names(&self) -> Vec<String> {
        self.properties.keys().cloned().collect()
    }
}

/// Snapshot of environment variables with relaxed key matching:
/// `encryptor.password` also finds `ENCRYPTOR_PASSWORD` and `encryptor_password`.
#[derive(Debug, Clone)]
pub struct EnvVarPropertySource {
    name: String,
    variables: IndexMap<String, String>,
}

impl EnvVarPropertySource {
    pub const NAME: &'static str = "environment variables";

    /// Captures the current process environment.
    pub fn new() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Captures only variables starting with `prefix`, with the prefix removed.
    pub fn with_prefix(prefix: &str) -> Self {
        let variables = std::env::vars()
            .filter_map(|(key, value)| key.strip_prefix(prefix).map(|k| (k.to_string(), value)))
            .collect();
        Self {
            name: format!("{} (prefix: {prefix})", Self::NAME),
            variables,
        }
    }

    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            name: Self::NAME.to_string(),
            variables: vars.into_iter().collect(),
        }
    }

    fn candidates(key: &str) -> [String; 3] {
        let underscored = key.replace(['.', '-'], "_");
        let upper = underscored.to_uppercase();
        [key.to_string(), underscored, upper]
    }
}

impl Default for EnvVarPropertySource {
    fn default() -> Self {
        Self::new()
    }
}

impl PropertySource for EnvVarPropertySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn raw_property(&self, key: &str) -> Option<String> {
        Self::candidates(key)
            .iter()
            .find_map(|candidate| self.variables.get(candidate).cloned())
    }

    fn property_names(&self) -> Vec<String> {
        self.variables.keys().cloned().collect()
    }
}

/// JSON document flattened to dotted keys: `{"db": {"pass": "x"}}` becomes
/// `db.pass`, arrays become `key[0]`, scalars become their text and `null` is absent.
#[derive(Debug, Clone)]
pub struct JsonFilePropertySource {
    inner: MapPropertySource,
}

impl JsonFilePropertySource {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let raw_json = fs::read_to_string(path).map_err(|e| SourceError::Io(format!("{}: {e}", path.display())))?;
        Self::from_json_str(format!("json [{}]", path.display()), &raw_json)
    }

    pub fn from_json_str(name: impl Into<String>, raw_json: &str) -> Result<Self, SourceError> {
        let document: Value =
            serde_json::from_str(raw_json).map_err(|e| SourceError::Parse(format!("{e}")))?;
        let Value::Object(root) = document else {
            return Err(SourceError::InvalidShape(
                "top-level JSON value must be an object".to_string(),
            ));
        };

        let mut properties = IndexMap::new();
        for (key, value) in root {
            flatten(&key, value, &mut properties);
        }
        Ok(Self {
            inner: MapPropertySource::new(name, properties),
        })
    }
}

fn flatten(prefix: &str, value: Value, out: &mut IndexMap<String, String>) {
    match value {
        Value::Null => {}
        Value::String(text) => {
            out.insert(prefix.to_string(), text);
        }
        Value::Bool(flag) => {
            out.insert(prefix.to_string(), flag.to_string());
        }
        Value::Number(number) => {
            out.insert(prefix.to_string(), number.to_string());
        }
        Value::Array(items) => {
            for (index, item) in items.into_iter().enumerate() {
                flatten(&format!("{prefix}[{index}]"), item, out);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                flatten(&format!("{prefix}.{key}"), item, out);
            }
        }
    }
}

impl PropertySource for JsonFilePropertySource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn raw_property(&self, key: &str) -> Option<String> {
        self.inner.raw_property(key)
    }

    fn property_names(&self) -> Vec<String> {
        self.inner.property_names()
    }
}
