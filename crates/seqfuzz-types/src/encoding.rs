//! Hex encoding helpers and the 32-byte digest type.
//!
//! Provides shared encoding/decoding functions used across workspace crates.

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

// =============================================================================
// Hex Bytes
// =============================================================================

/// Encode bytes as a `0x`-prefixed lowercase hex string.
pub fn to_hex_prefixed(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Parse a hex string to raw bytes.
///
/// # Arguments
/// * `hex_str` - Hex string (with or without 0x prefix)
/// * `context` - Description for error messages
pub fn parse_hex_bytes(hex_str: &str, context: &str) -> Result<Vec<u8>> {
    let hex_str = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    hex::decode(hex_str).map_err(|e| anyhow!("Invalid {} hex '{}': {}", context, hex_str, e))
}

/// Serde adapter for `Vec<u8>` fields stored as 0x-hex strings.
///
/// Use with `#[serde(with = "seqfuzz_types::encoding::hex_bytes")]`.
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::to_hex_prefixed(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_hex_bytes(&s, "byte string").map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Hash32
// =============================================================================

/// A 32-byte digest (transaction hash, block hash).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash32(pub [u8; 32]);

impl Hash32 {
    pub const ZERO: Hash32 = Hash32([0u8; 32]);

    /// SHA-256 of `bytes`.
    pub fn digest(bytes: &[u8]) -> Self {
        let out = Sha256::digest(bytes);
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&out);
        Hash32(hash)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// First 4 bytes as hex, for compact log output.
    pub fn short(&self) -> String {
        format!("0x{}", hex::encode(&self.0[..4]))
    }
}

impl FromStr for Hash32 {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = parse_hex_bytes(s, "hash")?;
        if bytes.len() != 32 {
            return Err(anyhow!(
                "Invalid hash '{}': expected 32 bytes, got {}",
                s,
                bytes.len()
            ));
        }
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes);
        Ok(Hash32(hash))
    }
}

impl fmt::Display for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", to_hex_prefixed(&self.0))
    }
}

impl fmt::Debug for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash32({})", self.short())
    }
}

impl Serialize for Hash32 {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Hash32 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Hash32::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_bytes_with_and_without_prefix() {
        assert_eq!(parse_hex_bytes("0x0102", "data").unwrap(), vec![1, 2]);
        assert_eq!(parse_hex_bytes("0102", "data").unwrap(), vec![1, 2]);
        assert!(parse_hex_bytes("0x0g", "data").is_err());
    }

    #[test]
    fn test_digest_is_stable() {
        let a = Hash32::digest(b"seqfuzz");
        let b = Hash32::digest(b"seqfuzz");
        assert_eq!(a, b);
        assert_ne!(a, Hash32::digest(b"other"));
    }

    #[test]
    fn test_hash_display_parses_back() {
        let h = Hash32::digest(b"block");
        let parsed: Hash32 = h.to_string().parse().unwrap();
        assert_eq!(parsed, h);
        assert!("0x01".parse::<Hash32>().is_err());
    }
}
