//! Password-based cipher instance. One `PbeCipher` derives keys from the
//! configured password and salt strategy and seals or opens raw messages.
//!
//! Message layouts (salt omitted when the salt generator does not include it):
//! - `PBEWithMD5AndDES`: salt(8) + DES-CBC ciphertext, key and IV from PBKDF1-MD5
//! - `PBEWithHMACSHA512AndAES_256`: salt(16) + iv(16) + AES-256-CBC ciphertext
//! - `PBEWithHMACSHA256AndCHACHA20_POLY1305`: salt(16) + nonce(12) + ciphertext + tag(16)

use std::fmt;
use std::num::NonZeroU32;

use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use hmac::Hmac;
use md5::{Digest, Md5};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Sha256, Sha512};
use zeroize::Zeroizing;

use super::algorithm::{PbeAlgorithm, SaltGenerator};
use super::CipherError;

type DesCbcEnc = cbc::Encryptor<des::Des>;
type DesCbcDec = cbc::Decryptor<des::Des>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const DES_BLOCK: usize = 8;
const AES_BLOCK: usize = 16;
const CHACHA_NONCE: usize = 12;
const POLY1305_TAG: usize = 16;
const DERIVED_KEY_LEN: usize = 32;

struct DerivedKey {
    salt: Vec<u8>,
    material: Zeroizing<Vec<u8>>,
}

/// A single cipher worker. Instances are not shared between threads; the
/// encryptor hands them out through [`super::InstancePool`].
pub struct PbeCipher {
    algorithm: PbeAlgorithm,
    password: Zeroizing<Vec<u8>>,
    iterations: NonZeroU32,
    salt_generator: SaltGenerator,
    // Only populated for salt generators that never vary the salt.
    cached: Option<DerivedKey>,
}

impl PbeCipher {
    pub fn new(
        algorithm: PbeAlgorithm,
        password: &str,
        iterations: NonZeroU32,
        salt_generator: SaltGenerator,
    ) -> Self {
        Self {
            algorithm,
            password: Zeroizing::new(password.as_bytes().to_vec()),
            iterations,
            salt_generator,
            cached: None,
        }
    }

    /// Encrypts raw bytes into a complete message (salt, IV or nonce, ciphertext).
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        let salt = self.salt_generator.generate(self.algorithm.salt_len());
        let material = self.key_material(&salt)?;

        let body = match self.algorithm {
            PbeAlgorithm::Md5Des => {
                let (key, iv) = material.split_at(DES_BLOCK);
                DesCbcEnc::new_from_slices(key, iv)
                    .map_err(|e| CipherError::EncryptionFailed(format!("{e}")))?
                    .encrypt_padded_vec_mut::<Pkcs7>(plaintext)
            }
            PbeAlgorithm::HmacSha512Aes256 => {
                let mut iv = [0u8; AES_BLOCK];
                OsRng.fill_bytes(&mut iv);
                let ciphertext = Aes256CbcEnc::new_from_slices(&material, &iv)
                    .map_err(|e| CipherError::EncryptionFailed(format!("{e}")))?
                    .encrypt_padded_vec_mut::<Pkcs7>(plaintext);
                let mut body = iv.to_vec();
                body.extend_from_slice(&ciphertext);
                body
            }
            PbeAlgorithm::HmacSha256ChaCha20Poly1305 => {
                let mut nonce = [0u8; CHACHA_NONCE];
                OsRng.fill_bytes(&mut nonce);
                let cipher = ChaCha20Poly1305::new_from_slice(&material)
                    .map_err(|e| CipherError::EncryptionFailed(format!("{e}")))?;
                let ciphertext = cipher
                    .encrypt(Nonce::from_slice(&nonce), plaintext)
                    .map_err(|e| CipherError::EncryptionFailed(format!("{e}")))?;
                let mut body = nonce.to_vec();
                body.extend_from_slice(&ciphertext);
                body
            }
        };

        let mut message = if self.salt_generator.includes_salt() {
            salt
        } else {
            Vec::with_capacity(body.len())
        };
        message.extend_from_slice(&body);
        Ok(message)
    }

    /// Decrypts a complete message produced by [`PbeCipher::encrypt`] or by a
    /// jasypt encryptor configured with the same settings.
    pub fn decrypt(&mut self, message: &[u8]) -> Result<Vec<u8>, CipherError> {
        let salt_len = self.algorithm.salt_len();
        let (salt, body) = if self.salt_generator.includes_salt() {
            if message.len() < salt_len {
                return Err(CipherError::DecryptionFailed(
                    "message shorter than salt".to_string(),
                ));
            }
            let (salt, body) = message.split_at(salt_len);
            (salt.to_vec(), body)
        } else {
            (self.salt_generator.generate(salt_len), message)
        };
        let material = self.key_material(&salt)?;

        match self.algorithm {
            PbeAlgorithm::Md5Des => {
                check_block_body(body, DES_BLOCK)?;
                let (key, iv) = material.split_at(DES_BLOCK);
                DesCbcDec::new_from_slices(key, iv)
                    .map_err(|e| CipherError::DecryptionFailed(format!("{e}")))?
                    .decrypt_padded_vec_mut::<Pkcs7>(body)
                    .map_err(|_| bad_padding())
            }
            PbeAlgorithm::HmacSha512Aes256 => {
                if body.len() < AES_BLOCK {
                    return Err(CipherError::DecryptionFailed(
                        "message shorter than initialization vector".to_string(),
                    ));
                }
                let (iv, ciphertext) = body.split_at(AES_BLOCK);
                check_block_body(ciphertext, AES_BLOCK)?;
                Aes256CbcDec::new_from_slices(&material, iv)
                    .map_err(|e| CipherError::DecryptionFailed(format!("{e}")))?
                    .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
                    .map_err(|_| bad_padding())
            }
            PbeAlgorithm::HmacSha256ChaCha20Poly1305 => {
                if body.len() < CHACHA_NONCE + POLY1305_TAG {
                    return Err(CipherError::DecryptionFailed(
                        "message shorter than nonce and authentication tag".to_string(),
                    ));
                }
                let (nonce, ciphertext) = body.split_at(CHACHA_NONCE);
                let cipher = ChaCha20Poly1305::new_from_slice(&material)
                    .map_err(|e| CipherError::DecryptionFailed(format!("{e}")))?;
                cipher
                    .decrypt(Nonce::from_slice(nonce), ciphertext)
                    .map_err(|e| CipherError::DecryptionFailed(format!("{e}")))
            }
        }
    }

    fn key_material(&mut self, salt: &[u8]) -> Result<Zeroizing<Vec<u8>>, CipherError> {
        if let Some(cached) = &self.cached {
            if cached.salt == salt {
                return Ok(cached.material.clone());
            }
        }

        let material = self.derive(salt)?;
        if !self.salt_generator.includes_salt() {
            self.cached = Some(DerivedKey {
                salt: salt.to_vec(),
                material: material.clone(),
            });
        }
        Ok(material)
    }

    fn derive(&self, salt: &[u8]) -> Result<Zeroizing<Vec<u8>>, CipherError> {
        let rounds = self.iterations.get();
        match self.algorithm {
            PbeAlgorithm::Md5Des => {
                // PKCS#5 v1.5 PBKDF1: first half is the DES key, second half the IV.
                let mut digest = Md5::new();
                digest.update(self.password.as_slice());
                digest.update(salt);
                let mut block = digest.finalize();
                for _ in 1..rounds {
                    block = Md5::digest(block);
                }
                let material = Zeroizing::new(block.to_vec());
                block.iter_mut().for_each(|b| *b = 0);
                Ok(material)
            }
            PbeAlgorithm::HmacSha512Aes256 => {
                let mut output = Zeroizing::new(vec![0u8; DERIVED_KEY_LEN]);
                pbkdf2::pbkdf2::<Hmac<Sha512>>(&self.password, salt, rounds, &mut output)
                    .map_err(|e| CipherError::DecryptionFailed(format!("key derivation: {e}")))?;
                Ok(output)
            }
            PbeAlgorithm::HmacSha256ChaCha20Poly1305 => {
                let mut output = Zeroizing::new(vec![0u8; DERIVED_KEY_LEN]);
                pbkdf2::pbkdf2::<Hmac<Sha256>>(&self.password, salt, rounds, &mut output)
                    .map_err(|e| CipherError::DecryptionFailed(format!("key derivation: {e}")))?;
                Ok(output)
            }
        }
    }
}

impl fmt::Debug for PbeCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PbeCipher")
            .field("algorithm", &self.algorithm)
            .field("iterations", &self.iterations)
            .field("salt_generator", &self.salt_generator)
            .field("password", &"<redacted>")
            .finish()
    }
}

fn check_block_body(body: &[u8], block: usize) -> Result<(), CipherError> {
    if body.is_empty() || body.len() % block != 0 {
        return Err(CipherError::DecryptionFailed(format!(
            "ciphertext length {} is not a positive multiple of {block}",
            body.len()
        )));
    }
    Ok(())
}

fn bad_padding() -> CipherError {
    CipherError::DecryptionFailed("invalid padding; wrong password or corrupt ciphertext".to_string())
}
