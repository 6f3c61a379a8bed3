//! Password-based encryption engine backing `ENC(...)` configuration values.
//! Each submodule covers one concern: algorithm and salt selection, payload
//! encoding, the per-instance cipher, the instance pool, and the pooled string
//! encryptor that ties them together.

pub mod algorithm;
pub mod encoding;
pub mod encryptor;
pub mod pbe;
pub mod pool;

use thiserror::Error;

pub use algorithm::{PbeAlgorithm, Provider, SaltGenerator};
pub use encoding::OutputEncoding;
pub use encryptor::{PooledPbeStringEncryptor, StringEncryptor};
pub use pbe::PbeCipher;
pub use pool::{InstancePool, Pooled};

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("payload decoding failed: {0}")]
    Decode(String),
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),
    #[error("decrypted value is not valid utf-8: {0}")]
    Utf8(String),
}
