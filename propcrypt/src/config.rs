//! Resolution of the encryptor's own settings. The settings are read from the
//! raw (undecrypted) view of the environment because the encryptor cannot
//! depend on itself to be configured.

use std::fmt;

use thiserror::Error;
use tracing::info;
use zeroize::Zeroizing;

use crate::environment::Environment;

pub const KEY_PASSWORD: &str = "encryptor.password";
pub const KEY_ALGORITHM: &str = "encryptor.algorithm";
pub const KEY_ITERATIONS: &str = "encryptor.keyObtentionIterations";
pub const KEY_POOL_SIZE: &str = "encryptor.poolSize";
pub const KEY_PROVIDER_NAME: &str = "encryptor.providerName";
pub const KEY_SALT_GENERATOR: &str = "encryptor.saltGeneratorClassname";
pub const KEY_OUTPUT_TYPE: &str = "encryptor.stringOutputType";

pub const DEFAULT_ALGORITHM: &str = "PBEWithMD5AndDES";
pub const DEFAULT_ITERATIONS: &str = "1000";
pub const DEFAULT_POOL_SIZE: &str = "1";
pub const DEFAULT_PROVIDER_NAME: &str = "SunJCE";
pub const DEFAULT_SALT_GENERATOR: &str = "org.jasypt.salt.RandomSaltGenerator";
pub const DEFAULT_OUTPUT_TYPE: &str = "base64";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required encryption configuration property missing: {0}")]
    MissingRequired(String),
    #[error("encryption password must not be empty")]
    EmptyPassword,
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
    #[error("unsupported encryption algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("unsupported security provider: {0}")]
    UnsupportedProvider(String),
    #[error("unsupported salt generator: {0}")]
    UnsupportedSaltGenerator(String),
    #[error("unsupported string output type: {0}")]
    UnsupportedOutputType(String),
}

/// Raw encryptor settings as found in configuration. Validation happens when
/// the encryptor is built so every problem surfaces at startup.
#[derive(Clone)]
pub struct EncryptorSettings {
    password: Zeroizing<String>,
    pub algorithm: String,
    pub key_obtention_iterations: String,
    pub pool_size: String,
    pub provider_name: String,
    pub salt_generator_classname: String,
    pub string_output_type: String,
}

impl EncryptorSettings {
    /// Settings with the given password and every optional value at its default.
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: Zeroizing::new(password.into()),
            algorithm: DEFAULT_ALGORITHM.to_string(),
            key_obtention_iterations: DEFAULT_ITERATIONS.to_string(),
            pool_size: DEFAULT_POOL_SIZE.to_string(),
            provider_name: DEFAULT_PROVIDER_NAME.to_string(),
            salt_generator_classname: DEFAULT_SALT_GENERATOR.to_string(),
            string_output_type: DEFAULT_OUTPUT_TYPE.to_string(),
        }
    }

    /// Reads every `encryptor.*` key from the raw view of `env`.
    /// Fails only when the password is absent.
    pub fn resolve(env: &Environment) -> Result<Self, ConfigError> {
        let password = require_property(env, KEY_PASSWORD)?;
        Ok(Self {
            password: Zeroizing::new(password),
            algorithm: optional_property(env, KEY_ALGORITHM, DEFAULT_ALGORITHM),
            key_obtention_iterations: optional_property(env, KEY_ITERATIONS, DEFAULT_ITERATIONS),
            pool_size: optional_property(env, KEY_POOL_SIZE, DEFAULT_POOL_SIZE),
            provider_name: optional_property(env, KEY_PROVIDER_NAME, DEFAULT_PROVIDER_NAME),
            salt_generator_classname: optional_property(env, KEY_SALT_GENERATOR, DEFAULT_SALT_GENERATOR),
            string_output_type: optional_property(env, KEY_OUTPUT_TYPE, DEFAULT_OUTPUT_TYPE),
        })
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn with_algorithm(mut self, value: impl Into<String>) -> Self {
        self.algorithm = value.into();
        self
    }

    pub fn with_key_obtention_iterations(mut self, value: impl Into<String>) -> Self {
        self.key_obtention_iterations = value.into();
        self
    }

    pub fn with_pool_size(mut self, value: impl Into<String>) -> Self {
        self.pool_size = value.into();
        self
    }

    pub fn with_provider_name(mut self, value: impl Into<String>) -> Self {
        self.provider_name = value.into();
        self
    }

    pub fn with_salt_generator_classname(mut self, value: impl Into<String>) -> Self {
        self.salt_generator_classname = value.into();
        self
    }

    pub fn with_string_output_type(mut self, value: impl Into<String>) -> Self {
        self.string_output_type = value.into();
        self
    }
}

impl fmt::Debug for EncryptorSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptorSettings")
            .field("password", &"<redacted>")
            .field("algorithm", &self.algorithm)
            .field("key_obtention_iterations", &self.key_obtention_iterations)
            .field("pool_size", &self.pool_size)
            .field("provider_name", &self.provider_name)
            .field("salt_generator_classname", &self.salt_generator_classname)
            .field("string_output_type", &self.string_output_type)
            .finish()
    }
}

/// Returns the raw value of `key` or fails naming the missing key.
pub fn require_property(env: &Environment, key: &str) -> Result<String, ConfigError> {
    env.raw_property(key)
        .ok_or_else(|| ConfigError::MissingRequired(key.to_string()))
}

/// Returns the raw value of `key`, or `default` (logged at info level) when absent.
pub fn optional_property(env: &Environment, key: &str, default: &str) -> String {
    match env.raw_property(key) {
        Some(value) => value,
        None => {
            info!(key, default, "encryptor setting not found; using default");
            default.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        optional_property, require_property, ConfigError, EncryptorSettings, KEY_ALGORITHM,
        KEY_PASSWORD, KEY_POOL_SIZE,
    };
    use crate::environment::Environment;
    use crate::source::MapPropertySource;
    use std::sync::Arc;

    fn env_with(pairs: &[(&str, &str)]) -> Environment {
        let mut env = Environment::new();
        env.add_last(Arc::new(MapPropertySource::from_pairs("test", pairs.iter().copied())));
        env
    }

    #[test]
    fn missing_password_names_the_key() {
        let env = env_with(&[(KEY_ALGORITHM, "PBEWithMD5AndDES")]);
        let err = EncryptorSettings::resolve(&env).unwrap_err();
        assert!(matches!(&err, ConfigError::MissingRequired(key) if key == KEY_PASSWORD));
        assert!(format!("{err}").contains("encryptor.password"));
    }

    #[test]
    fn optional_settings_fall_back_to_defaults() {
        let env = env_with(&[(KEY_PASSWORD, "pw"), (KEY_POOL_SIZE, "4")]);
        let settings = EncryptorSettings::resolve(&env).expect("password is present");
        assert_eq!(settings.password(), "pw");
        assert_eq!(settings.algorithm, "PBEWithMD5AndDES");
        assert_eq!(settings.key_obtention_iterations, "1000");
        assert_eq!(settings.pool_size, "4");
        assert_eq!(settings.provider_name, "SunJCE");
        assert_eq!(settings.salt_generator_classname, "org.jasypt.salt.RandomSaltGenerator");
        assert_eq!(settings.string_output_type, "base64");
    }

    #[test]
    fn require_and_optional_read_raw_values() {
        let env = env_with(&[("db.pass", "ENC(abc)")]);
        assert_eq!(require_property(&env, "db.pass").unwrap(), "ENC(abc)");
        assert_eq!(optional_property(&env, "db.user", "sa"), "sa");
        assert!(require_property(&env, "db.user").is_err());
    }

    #[test]
    fn debug_output_redacts_password() {
        let printed = format!("{:?}", EncryptorSettings::new("top-secret"));
        assert!(!printed.contains("top-secret"));
    }
}
