//! SHA-256 digests of captured image bytes.
//!
//! The digest is always computed over the exact bytes that are uploaded, so a
//! reviewer can recompute it from the stored attachment and compare it with the
//! ledger entry.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::HashError;

/// Lowercase hex SHA-256 of an image's encoded bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImageHash(String);

impl ImageHash {
    /// Hash raw image bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(data)))
    }

    /// Parse a hex digest, accepting either case.
    pub fn parse(value: &str) -> Result<Self, HashError> {
        if value.len() != 64 {
            return Err(HashError::InvalidLength(value.len()));
        }
        hex::decode(value).map_err(|e| HashError::InvalidHex(e.to_string()))?;
        Ok(Self(value.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if `data` hashes to this digest.
    pub fn verify(&self, data: &[u8]) -> bool {
        Self::from_bytes(data) == *self
    }
}

impl fmt::Display for ImageHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ImageHash {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ImageHash {
    type Error = HashError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ImageHash> for String {
    fn from(hash: ImageHash) -> Self {
        hash.0
    }
}
