//! Recognition of `ENC(...)` literals in raw configuration values.

pub const MARKER_PREFIX: &str = "ENC(";
pub const MARKER_SUFFIX: &str = ")";

/// Classification of one raw configuration value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncryptedLiteral<'a> {
    /// Not an encrypted literal; carries the raw value untouched.
    Plain(&'a str),
    /// Marker-wrapped value; carries the encoded payload between the markers.
    Encrypted(&'a str),
}

/// Classifies `raw`. Surrounding whitespace is ignored when matching the
/// markers; a blank payload (`ENC()`, `ENC( )`) or a half-open marker is plain text.
pub fn detect(raw: &str) -> EncryptedLiteral<'_> {
    let trimmed = raw.trim();
    match trimmed
        .strip_prefix(MARKER_PREFIX)
        .and_then(|rest| rest.strip_suffix(MARKER_SUFFIX))
    {
        Some(payload) if !payload.trim().is_empty() => EncryptedLiteral::Encrypted(payload),
        _ => EncryptedLiteral::Plain(raw),
    }
}

pub fn is_encrypted(raw: &str) -> bool {
    matches!(detect(raw), EncryptedLiteral::Encrypted(_))
}

/// Wraps an encoded payload in the marker pair.
pub fn wrap(payload: &str) -> String {
    format!("{MARKER_PREFIX}{payload}{MARKER_SUFFIX}")
}
