//! Startup wiring: wraps every registered source in a
//! [`DecryptingPropertySource`] and provisions the default encryptor when the
//! caller did not supply one.

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::{ConfigError, EncryptorSettings};
use crate::crypto::{PooledPbeStringEncryptor, StringEncryptor};
use crate::decrypting::DecryptingPropertySource;
use crate::environment::Environment;

/// Outcome of one installer pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub wrapped: usize,
    pub already_wrapped: usize,
}

/// Replaces each source of `env` with a decrypting wrapper in the same slot.
/// Sources that already decrypt are left alone, so repeated runs are no-ops.
pub fn install_decrypting_sources(
    env: &mut Environment,
    encryptor: &Arc<dyn StringEncryptor>,
) -> InstallReport {
    let mut report = InstallReport::default();
    for slot in env.sources_mut() {
        if slot.is_decrypting() {
            debug!(source = slot.name(), "source already decrypts; skipping");
            report.already_wrapped += 1;
            continue;
        }
        debug!(source = slot.name(), "wrapping source");
        let wrapper = DecryptingPropertySource::new(Arc::clone(slot), Arc::clone(encryptor));
        *slot = Arc::new(wrapper);
        report.wrapped += 1;
    }
    info!(
        wrapped = report.wrapped,
        already_wrapped = report.already_wrapped,
        "encryptable property sources installed"
    );
    report
}

/// Entry point for applications: resolve or accept an encryptor, then install
/// the wrappers. Run once before the environment is shared with readers.
#[derive(Default)]
pub struct EncryptablePropertiesBootstrap {
    encryptor: Option<Arc<dyn StringEncryptor>>,
}

impl EncryptablePropertiesBootstrap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `encryptor` instead of building one from `encryptor.*` settings.
    pub fn with_encryptor(mut self, encryptor: Arc<dyn StringEncryptor>) -> Self {
        self.encryptor = Some(encryptor);
        self
    }

    /// Returns the encryptor now backing every source of `env`.
    pub fn initialize(self, env: &mut Environment) -> Result<Arc<dyn StringEncryptor>, ConfigError> {
        let encryptor = match self.encryptor {
            Some(encryptor) => {
                info!("using caller-supplied string encryptor");
                encryptor
            }
            None => {
                let settings = EncryptorSettings::resolve(env)?;
                Arc::new(PooledPbeStringEncryptor::new(&settings)?) as Arc<dyn StringEncryptor>
            }
        };
        install_decrypting_sources(env, &encryptor);
        Ok(encryptor)
    }
}

#[cfg(test)]
mod tests {
    use super::{install_decrypting_sources, EncryptablePropertiesBootstrap, InstallReport};
    use crate::config::{ConfigError, EncryptorSettings, KEY_ITERATIONS, KEY_PASSWORD, KEY_POOL_SIZE};
    use crate::crypto::{CipherError, PooledPbeStringEncryptor, StringEncryptor};
    use crate::detector::wrap;
    use crate::environment::Environment;
    use crate::source::{MapPropertySource, PropertyError, PropertySource};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    const PASSWORD: &str = "installer-password";

    fn encryptor(pool_size: &str) -> Arc<dyn StringEncryptor> {
        let settings = EncryptorSettings::new(PASSWORD)
            .with_key_obtention_iterations("20")
            .with_pool_size(pool_size);
        Arc::new(PooledPbeStringEncryptor::new(&settings).expect("valid settings"))
    }

    fn source(name: &str, pairs: Vec<(String, String)>) -> Arc<dyn PropertySource> {
        Arc::new(MapPropertySource::from_pairs(name, pairs))
    }

    fn pair(key: &str, value: &str) -> (String, String) {
        (key.to_string(), value.to_string())
    }

    #[test]
    fn decrypts_after_installation() {
        let encryptor = encryptor("1");
        let secret = wrap(&encryptor.encrypt("s3cr3t").unwrap());
        let mut env = Environment::new();
        env.add_last(source("app", vec![pair("db.pass", &secret), pair("db.user", "sa")]));

        assert_eq!(env.property("db.pass").unwrap(), Some(secret.clone()));
        install_decrypting_sources(&mut env, &encryptor);
        assert_eq!(env.property("db.pass").unwrap().as_deref(), Some("s3cr3t"));
        assert_eq!(env.property("db.user").unwrap().as_deref(), Some("sa"));
        assert_eq!(env.raw_property("db.pass"), Some(secret));
    }

    #[test]
    fn higher_precedence_plaintext_still_wins() {
        let encryptor = encryptor("1");
        let secret = wrap(&encryptor.encrypt("from-file").unwrap());
        let mut env = Environment::new();
        env.add_last(source("file", vec![pair("db.pass", &secret)]));
        env.add_first(source("overrides", vec![pair("db.pass", "from-override")]));

        install_decrypting_sources(&mut env, &encryptor);
        assert_eq!(env.source_names(), vec!["overrides", "file"]);
        assert_eq!(env.property("db.pass").unwrap().as_deref(), Some("from-override"));
    }

    #[test]
    fn second_run_does_not_double_wrap() {
        let encryptor = encryptor("1");
        let secret = wrap(&encryptor.encrypt("once").unwrap());
        let mut env = Environment::new();
        env.add_last(source("a", vec![pair("k", &secret)]));
        env.add_last(source("b", vec![]));

        let first = install_decrypting_sources(&mut env, &encryptor);
        let wrapped = env.sources().to_vec();
        let second = install_decrypting_sources(&mut env, &encryptor);

        assert_eq!(first, InstallReport { wrapped: 2, already_wrapped: 0 });
        assert_eq!(second, InstallReport { wrapped: 0, already_wrapped: 2 });
        assert!(wrapped.iter().zip(env.sources()).all(|(a, b)| Arc::ptr_eq(a, b)));
        assert_eq!(env.property("k").unwrap().as_deref(), Some("once"));
    }

    #[test]
    fn corrupt_value_surfaces_through_environment() {
        let mut env = Environment::new();
        env.add_last(source("app", vec![pair("api.key", "ENC(AAAAAAAAAAAAAAAAAAAAAA==)")]));
        install_decrypting_sources(&mut env, &encryptor("1"));

        let err = env.property("api.key").unwrap_err();
        assert!(matches!(err, PropertyError::Decryption { ref key, .. } if key == "api.key"));
    }

    #[test]
    fn concurrent_reads_with_small_pool_complete() {
        let encryptor = encryptor("2");
        let keys: Vec<String> = (0..12).map(|i| format!("secret.{i}")).collect();
        let pairs = keys
            .iter()
            .map(|key| pair(key, &wrap(&encryptor.encrypt(&format!("value-{key}")).unwrap())))
            .collect();
        let mut env = Environment::new();
        env.add_last(source("app", pairs));
        install_decrypting_sources(&mut env, &encryptor);

        let env = &env;
        thread::scope(|scope| {
            for key in &keys {
                scope.spawn(move || {
                    for _ in 0..3 {
                        let value = env.property(key).expect("decryption should succeed");
                        assert_eq!(value, Some(format!("value-{key}")));
                    }
                });
            }
        });
    }

    #[test]
    fn bootstrap_fails_fast_without_password() {
        let mut env = Environment::new();
        env.add_last(source("app", vec![pair("db.user", "sa")]));

        let Err(err) = EncryptablePropertiesBootstrap::new().initialize(&mut env) else {
            panic!("bootstrap must fail without a password");
        };
        assert!(matches!(&err, ConfigError::MissingRequired(key) if key == KEY_PASSWORD));
        assert!(env.sources().iter().all(|s| !s.is_decrypting()));
    }

    #[test]
    fn bootstrap_builds_default_encryptor_from_environment() {
        let sealer = encryptor("1");
        let secret = wrap(&sealer.encrypt("db-secret").unwrap());
        let mut env = Environment::new();
        env.add_last(source(
            "app",
            vec![
                pair(KEY_PASSWORD, PASSWORD),
                pair(KEY_ITERATIONS, "20"),
                pair(KEY_POOL_SIZE, "2"),
                pair("db.pass", &secret),
            ],
        ));

        let installed = EncryptablePropertiesBootstrap::new()
            .initialize(&mut env)
            .expect("bootstrap should succeed");
        assert_eq!(env.property("db.pass").unwrap().as_deref(), Some("db-secret"));
        assert_eq!(installed.decrypt(&sealer.encrypt("x").unwrap()).unwrap(), "x");
    }

    struct CountingEncryptor {
        calls: AtomicUsize,
    }

    impl StringEncryptor for CountingEncryptor {
        fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
            Ok(plaintext.chars().rev().collect())
        }

        fn decrypt(&self, payload: &str) -> Result<String, CipherError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(payload.chars().rev().collect())
        }
    }

    #[test]
    fn bootstrap_prefers_supplied_encryptor() {
        let custom = Arc::new(CountingEncryptor { calls: AtomicUsize::new(0) });
        let mut env = Environment::new();
        env.add_last(source("app", vec![pair("token", "ENC(olleh)")]));

        EncryptablePropertiesBootstrap::new()
            .with_encryptor(custom.clone())
            .initialize(&mut env)
            .expect("no password needed with a supplied encryptor");
        assert_eq!(env.property("token").unwrap().as_deref(), Some("hello"));
        assert_eq!(custom.calls.load(Ordering::SeqCst), 1);
    }
}
