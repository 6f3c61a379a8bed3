//! Decorator that decrypts `ENC(...)` values of one wrapped source on read.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::crypto::StringEncryptor;
use crate::detector::{detect, EncryptedLiteral};
use crate::source::{PropertyError, PropertySource};

pub struct DecryptingPropertySource {
    delegate: Arc<dyn PropertySource>,
    encryptor: Arc<dyn StringEncryptor>,
}

impl DecryptingPropertySource {
    pub fn new(delegate: Arc<dyn PropertySource>, encryptor: Arc<dyn StringEncryptor>) -> Self {
        Self { delegate, encryptor }
    }
}

impl PropertySource for DecryptingPropertySource {
    fn name(&self) -> &str {
        self.delegate.name()
    }

    fn raw_property(&self, key: &str) -> Option<String> {
        self.delegate.raw_property(key)
    }

    fn property(&self, key: &str) -> Result<Option<String>, PropertyError> {
        let Some(raw) = self.delegate.raw_property(key) else {
            return Ok(None);
        };

        match detect(&raw) {
            EncryptedLiteral::Plain(_) => Ok(Some(raw)),
            EncryptedLiteral::Encrypted(payload) => match self.encryptor.decrypt(payload) {
                Ok(plaintext) => {
                    debug!(key, source = self.delegate.name(), "decrypted property");
                    Ok(Some(plaintext))
                }
                Err(err) => {
                    warn!(key, source = self.delegate.name(), "property decryption failed");
                    Err(PropertyError::Decryption {
                        key: key.to_string(),
                        source: err,
                    })
                }
            },
        }
    }

    fn property_names(&self) -> Vec<String> {
        self.delegate.property_names()
    }

    fn is_decrypting(&self) -> bool {
        true
    }
}
