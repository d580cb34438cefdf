//! BLAKE3 content hashing for unit identity

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Length of a rendered hash in hex characters
pub const HASH_HEX_LEN: usize = 64;

/// A BLAKE3 digest of a unit's text (32 bytes)
///
/// The hash is the identity of a piece of content: markers, snapshots and the
/// status tree index all key on it.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct ContentHash([u8; 32]);

/// Error returned when a hex string is not a valid content hash
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HashParseError {
    #[error("invalid hash length: expected {HASH_HEX_LEN} characters, got {0}")]
    Length(usize),
    #[error("invalid hex in hash: {0}")]
    Hex(String),
}

impl ContentHash {
    /// Create a hash from raw digest bytes
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the hash as a byte slice
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex rendering, as written into markers
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a 64-character hex string
    pub fn from_hex(s: &str) -> Result<Self, HashParseError> {
        if s.len() != HASH_HEX_LEN {
            return Err(HashParseError::Length(s.len()));
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes).map_err(|e| HashParseError::Hex(e.to_string()))?;
        Ok(Self(bytes))
    }

    /// Check whether a token looks like a rendered hash without decoding it
    pub fn is_hash_token(s: &str) -> bool {
        s.len() == HASH_HEX_LEN && s.bytes().all(|b| b.is_ascii_hexdigit())
    }

    /// First 8 hex characters, for log lines
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ContentHash {
    type Err = HashParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Hash bytes using BLAKE3
pub fn hash_bytes(data: &[u8]) -> ContentHash {
    let hash = blake3::hash(data);
    ContentHash::from_bytes(*hash.as_bytes())
}

/// Hash a unit's text
///
/// No normalization is applied: any byte difference is a different identity.
pub fn hash_text(text: &str) -> ContentHash {
    hash_bytes(text.as_bytes())
}
