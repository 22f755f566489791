//! Version tokens for optimistic concurrency

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use uuid::Uuid;

/// Opaque 8-byte row version
///
/// Replaced by the store on every successful write. A conditional write only
/// applies when the caller presents the token the store currently holds.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct VersionToken([u8; VersionToken::LEN]);

/// A token that could not be decoded
#[derive(Debug, Error, PartialEq)]
pub enum TokenError {
    #[error("version token must be {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },

    #[error("version token is not valid hex: {0}")]
    Hex(#[from] hex::FromHexError),
}

impl VersionToken {
    pub const LEN: usize = 8;

    /// Placeholder token carried by records that were never stored
    pub const ZERO: VersionToken = VersionToken([0; VersionToken::LEN]);

    /// Fresh random token
    pub fn generate() -> Self {
        let uuid = Uuid::new_v4();
        let mut bytes = [0u8; Self::LEN];
        bytes.copy_from_slice(&uuid.as_bytes()[..Self::LEN]);
        Self(bytes)
    }

    /// Fresh token guaranteed to differ from `previous`
    pub fn successor_of(previous: VersionToken) -> Self {
        loop {
            let next = Self::generate();
            if next != previous {
                return next;
            }
        }
    }

    pub fn from_bytes(bytes: [u8; Self::LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, TokenError> {
        let array: [u8; Self::LEN] = bytes.try_into().map_err(|_| TokenError::Length {
            expected: Self::LEN,
            actual: bytes.len(),
        })?;
        Ok(Self(array))
    }

    pub fn as_bytes(&self) -> &[u8; Self::LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VersionToken({})", self.to_hex())
    }
}

impl FromStr for VersionToken {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s.trim())?;
        Self::from_slice(&bytes)
    }
}

// Travels through forms and JSON as hex text.
impl Serialize for VersionToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for VersionToken {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
