//! String-level encryptor shared by every decrypting property source.

use std::fmt;
use std::num::{NonZeroU32, NonZeroUsize};

use tracing::info;

use super::algorithm::{PbeAlgorithm, Provider, SaltGenerator};
use super::encoding::OutputEncoding;
use super::pbe::PbeCipher;
use super::pool::InstancePool;
use super::CipherError;
use crate::config::{ConfigError, EncryptorSettings, KEY_ITERATIONS, KEY_POOL_SIZE};

/// Capability used by decrypting sources. Implementations must be usable from
/// many threads at once; the bootstrap accepts any implementation in place of
/// the default pooled encryptor.
pub trait StringEncryptor: Send + Sync {
    /// Encrypts `plaintext` and returns the encoded payload (without markers).
    fn encrypt(&self, plaintext: &str) -> Result<String, CipherError>;

    /// Decrypts an encoded payload (without markers) back to plaintext.
    fn decrypt(&self, payload: &str) -> Result<String, CipherError>;
}

/// Default encryptor: a fixed pool of identically configured [`PbeCipher`]
/// instances so concurrent reads do not serialize behind one cipher.
pub struct PooledPbeStringEncryptor {
    pool: InstancePool<PbeCipher>,
    algorithm: PbeAlgorithm,
    encoding: OutputEncoding,
}

impl PooledPbeStringEncryptor {
    /// Validates every setting and builds `poolSize` cipher instances.
    pub fn new(settings: &EncryptorSettings) -> Result<Self, ConfigError> {
        if settings.password().is_empty() {
            return Err(ConfigError::EmptyPassword);
        }
        let algorithm: PbeAlgorithm = settings.algorithm.parse()?;
        let provider: Provider = settings.provider_name.parse()?;
        let salt_generator: SaltGenerator = settings.salt_generator_classname.parse()?;
        let encoding: OutputEncoding = settings.string_output_type.parse()?;
        let iterations = parse_positive::<NonZeroU32>(KEY_ITERATIONS, &settings.key_obtention_iterations)?;
        let pool_size = parse_positive::<NonZeroUsize>(KEY_POOL_SIZE, &settings.pool_size)?;

        let instances = (0..pool_size.get())
            .map(|_| PbeCipher::new(algorithm, settings.password(), iterations, salt_generator))
            .collect();
        let pool = InstancePool::new(instances).ok_or_else(|| ConfigError::InvalidValue {
            key: KEY_POOL_SIZE.to_string(),
            value: settings.pool_size.clone(),
            reason: "pool must hold at least one instance".to_string(),
        })?;

        info!(
            algorithm = %algorithm,
            provider = provider.name(),
            salt_generator = salt_generator.class_name(),
            pool_size = pool_size.get(),
            output = encoding.name(),
            "string encryptor configured"
        );

        Ok(Self {
            pool,
            algorithm,
            encoding,
        })
    }

    pub fn algorithm(&self) -> PbeAlgorithm {
        self.algorithm
    }

    pub fn output_encoding(&self) -> OutputEncoding {
        self.encoding
    }

    pub fn pool_size(&self) -> usize {
        self.pool.capacity()
    }
}

impl StringEncryptor for PooledPbeStringEncryptor {
    fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        let message = self.pool.acquire().encrypt(plaintext.as_bytes())?;
        Ok(self.encoding.encode(&message))
    }

    fn decrypt(&self, payload: &str) -> Result<String, CipherError> {
        let message = self.encoding.decode(payload)?;
        let plaintext = self.pool.acquire().decrypt(&message)?;
        String::from_utf8(plaintext).map_err(|e| CipherError::Utf8(format!("{e}")))
    }
}

impl fmt::Debug for PooledPbeStringEncryptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledPbeStringEncryptor")
            .field("algorithm", &self.algorithm)
            .field("encoding", &self.encoding)
            .field("pool_size", &self.pool.capacity())
            .finish()
    }
}

fn parse_positive<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
        reason: "expected a positive integer".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::{PooledPbeStringEncryptor, StringEncryptor};
    use crate::config::{ConfigError, EncryptorSettings};
    use crate::crypto::{OutputEncoding, PbeAlgorithm};

    fn settings() -> EncryptorSettings {
        EncryptorSettings::new("pool-password").with_key_obtention_iterations("50")
    }

    #[test]
    fn round_trips_through_the_pool() {
        let encryptor = PooledPbeStringEncryptor::new(&settings().with_pool_size("3"))
            .expect("settings are valid");
        assert_eq!(encryptor.pool_size(), 3);
        let payload = encryptor.encrypt("s3cr3t").expect("encryption should work");
        assert_eq!(encryptor.decrypt(&payload).expect("decryption should work"), "s3cr3t");
    }

    #[test]
    fn default_algorithm_matches_explicit_md5_des() {
        let implicit = PooledPbeStringEncryptor::new(&settings()).unwrap();
        let explicit = PooledPbeStringEncryptor::new(&settings().with_algorithm("PBEWithMD5AndDES")).unwrap();
        assert_eq!(implicit.algorithm(), PbeAlgorithm::Md5Des);
        let payload = implicit.encrypt("same").unwrap();
        assert_eq!(explicit.decrypt(&payload).unwrap(), "same");
    }

    #[test]
    fn decrypts_jasypt_default_vector() {
        let encryptor = PooledPbeStringEncryptor::new(&EncryptorSettings::new("jasypt-test-password"))
            .expect("defaults are valid");
        assert_eq!(encryptor.decrypt("AQIDBAUGBwiupMGytb+y9g==").unwrap(), "s3cr3t");
    }

    #[test]
    fn emits_hexadecimal_when_configured() {
        let encryptor = PooledPbeStringEncryptor::new(&settings().with_string_output_type("hexadecimal"))
            .unwrap();
        assert_eq!(encryptor.output_encoding(), OutputEncoding::Hexadecimal);
        let payload = encryptor.encrypt("token").unwrap();
        assert!(payload.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(encryptor.decrypt(&payload).unwrap(), "token");
    }

    #[test]
    fn rejects_invalid_settings() {
        assert!(matches!(
            PooledPbeStringEncryptor::new(&EncryptorSettings::new("")),
            Err(ConfigError::EmptyPassword)
        ));
        assert!(matches!(
            PooledPbeStringEncryptor::new(&settings().with_algorithm("PBEWithSHA1AndRC4_128")),
            Err(ConfigError::UnsupportedAlgorithm(_))
        ));
        assert!(matches!(
            PooledPbeStringEncryptor::new(&settings().with_provider_name("BC")),
            Err(ConfigError::UnsupportedProvider(_))
        ));
        assert!(matches!(
            PooledPbeStringEncryptor::new(&settings().with_salt_generator_classname("Fixed")),
            Err(ConfigError::UnsupportedSaltGenerator(_))
        ));
        let err = PooledPbeStringEncryptor::new(&settings().with_pool_size("0")).unwrap_err();
        assert!(format!("{err}").contains("encryptor.poolSize"));
        let err = PooledPbeStringEncryptor::new(&settings().with_key_obtention_iterations("many"))
            .unwrap_err();
        assert!(format!("{err}").contains("encryptor.keyObtentionIterations"));
    }

    #[test]
    fn reports_corrupt_payloads() {
        let encryptor = PooledPbeStringEncryptor::new(&settings()).unwrap();
        assert!(encryptor.decrypt("%%%").is_err());
        assert!(encryptor.decrypt("AAAA").is_err());
    }
}
