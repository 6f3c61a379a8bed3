//! Identifiers accepted for `encryptor.algorithm`, `encryptor.providerName` and
//! `encryptor.saltGeneratorClassname`. Identifiers are matched
//! case-insensitively so values copied from jasypt configurations keep working.

use std::fmt::{self, Display};
use std::str::FromStr;

use rand::rngs::OsRng;
use rand::RngCore;

use crate::config::ConfigError;

/// Password-based encryption schemes understood by [`super::PbeCipher`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PbeAlgorithm {
    /// PKCS#5 PBKDF1 with MD5 feeding single DES in CBC mode.
    Md5Des,
    /// PBKDF2-HMAC-SHA512 feeding AES-256 in CBC mode with a random IV.
    HmacSha512Aes256,
    /// PBKDF2-HMAC-SHA256 feeding ChaCha20-Poly1305 with a random nonce.
    HmacSha256ChaCha20Poly1305,
}

impl PbeAlgorithm {
    pub const ALL: [PbeAlgorithm; 3] = [
        PbeAlgorithm::Md5Des,
        PbeAlgorithm::HmacSha512Aes256,
        PbeAlgorithm::HmacSha256ChaCha20Poly1305,
    ];

    pub fn identifier(&self) -> &'static str {
        match self {
            PbeAlgorithm::Md5Des => "PBEWithMD5AndDES",
            PbeAlgorithm::HmacSha512Aes256 => "PBEWithHMACSHA512AndAES_256",
            PbeAlgorithm::HmacSha256ChaCha20Poly1305 => "PBEWithHMACSHA256AndCHACHA20_POLY1305",
        }
    }

    /// Salt length in bytes, matching the block size jasypt uses for the scheme.
    pub fn salt_len(&self) -> usize {
        match self {
            PbeAlgorithm::Md5Des => 8,
            PbeAlgorithm::HmacSha512Aes256 | PbeAlgorithm::HmacSha256ChaCha20Poly1305 => 16,
        }
    }
}

impl Display for PbeAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

impl FromStr for PbeAlgorithm {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        PbeAlgorithm::ALL
            .into_iter()
            .find(|algorithm| algorithm.identifier().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ConfigError::UnsupportedAlgorithm(value.to_string()))
    }
}

/// Security provider selection. Both names resolve to the RustCrypto backed
/// implementation shipped with this crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provider {
    SunJce,
    RustCrypto,
}

impl Provider {
    pub fn name(&self) -> &'static str {
        match self {
            Provider::SunJce => "SunJCE",
            Provider::RustCrypto => "RustCrypto",
        }
    }
}

impl FromStr for Provider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sunjce" => Ok(Provider::SunJce),
            "rustcrypto" => Ok(Provider::RustCrypto),
            _ => Err(ConfigError::UnsupportedProvider(value.to_string())),
        }
    }
}

/// Strategy used to obtain the salt for key derivation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaltGenerator {
    /// Fresh random salt per message, stored in front of the ciphertext.
    Random,
    /// All-zero salt, never stored in the message.
    Zero,
}

impl SaltGenerator {
    pub fn class_name(&self) -> &'static str {
        match self {
            SaltGenerator::Random => "org.jasypt.salt.RandomSaltGenerator",
            SaltGenerator::Zero => "org.jasypt.salt.ZeroSaltGenerator",
        }
    }

    pub fn generate(&self, len: usize) -> Vec<u8> {
        let mut salt = vec![0u8; len];
        if let SaltGenerator::Random = self {
            OsRng.fill_bytes(&mut salt);
        }
        salt
    }

    /// Whether the salt travels inside the encrypted message.
    pub fn includes_salt(&self) -> bool {
        matches!(self, SaltGenerator::Random)
    }
}

impl FromStr for SaltGenerator {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let lowered = value.trim().to_ascii_lowercase();
        let simple = lowered.rsplit('.').next().unwrap_or(lowered.as_str());
        match simple {
            "randomsaltgenerator" | "random" => Ok(SaltGenerator::Random),
            "zerosaltgenerator" | "zero" => Ok(SaltGenerator::Zero),
            _ => Err(ConfigError::UnsupportedSaltGenerator(value.to_string())),
        }
    }
}
