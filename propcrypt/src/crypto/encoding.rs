//! Text encodings for encrypted payloads (`encryptor.stringOutputType`).

use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine};

use super::CipherError;
use crate::config::ConfigError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputEncoding {
    #[default]
    Base64,
    /// Upper-case hexadecimal on output; either case is accepted on input.
    Hexadecimal,
}

impl OutputEncoding {
    pub fn name(&self) -> &'static str {
        match self {
            OutputEncoding::Base64 => "base64",
            OutputEncoding::Hexadecimal => "hexadecimal",
        }
    }

    pub fn encode(&self, bytes: &[u8]) -> String {
        match self {
            OutputEncoding::Base64 => STANDARD.encode(bytes),
            OutputEncoding::Hexadecimal => hex::encode_upper(bytes),
        }
    }

    pub fn decode(&self, text: &str) -> Result<Vec<u8>, CipherError> {
        let text = text.trim();
        match self {
            OutputEncoding::Base64 => STANDARD
                .decode(text.as_bytes())
                .map_err(|e| CipherError::Decode(format!("{e}"))),
            OutputEncoding::Hexadecimal => {
                hex::decode(text).map_err(|e| CipherError::Decode(format!("{e}")))
            }
        }
    }
}

impl FromStr for OutputEncoding {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "base64" => Ok(OutputEncoding::Base64),
            "hexadecimal" | "hex" => Ok(OutputEncoding::Hexadecimal),
            _ => Err(ConfigError::UnsupportedOutputType(value.to_string())),
        }
    }
}
