//! Identity wrappers for reward-assignment file groups.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Error returned when parsing a hashed history id fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdParseError {
    message: String,
}

impl IdParseError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for IdParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for IdParseError {}

/// The hex-encoded SHA-256 digest of a raw `history_id`, used as the
/// filesystem-visible identifier for a file group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashedHistoryId(String);

impl HashedHistoryId {
    /// Parse a lowercase hex SHA-256 digest (64 hex characters).
    pub fn parse(value: &str) -> Result<Self, IdParseError> {
        if value.len() != 64 || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(IdParseError::new(format!(
                "invalid hashed history id: {value}"
            )));
        }
        Ok(Self(value.to_ascii_lowercase()))
    }

    /// Derive the hashed history id from a raw `history_id` value.
    pub fn from_raw(history_id: &str) -> Self {
        let digest = Sha256::digest(history_id.as_bytes());
        Self(hex_encode(&digest))
    }

    /// Returns true if `history_id` hashes to this identifier.
    pub fn verify(&self, history_id: &str) -> bool {
        Self::from_raw(history_id) == *self
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HashedHistoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for HashedHistoryId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    use fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(out, "{b:02x}").expect("writing to a String cannot fail");
    }
    out
}
