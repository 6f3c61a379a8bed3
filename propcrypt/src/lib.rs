//! Transparent decryption of `ENC(...)` values inside layered configuration.
//! Sources are wrapped once at startup; afterwards every read through the
//! [`environment::Environment`] returns plaintext, and the encryptor's own
//! settings come from the `encryptor.*` keys of the same environment.

pub mod config;
pub mod crypto;
pub mod decrypting;
pub mod detector;
pub mod environment;
pub mod installer;
pub mod source;

pub use config::{ConfigError, EncryptorSettings};
pub use crypto::{CipherError, PooledPbeStringEncryptor, StringEncryptor};
pub use decrypting::DecryptingPropertySource;
pub use detector::{detect, EncryptedLiteral};
pub use environment::Environment;
pub use installer::{install_decrypting_sources, EncryptablePropertiesBootstrap, InstallReport};
pub use source::{
    EnvVarPropertySource, JsonFilePropertySource, MapPropertySource, PropertyError, PropertySource,
    SourceError,
};
