//! Account and contract addresses.
//!
//! Addresses are 20-byte values, but they're often written in different forms:
//! - Short form: "0x2"
//! - Full form: "0x0000000000000000000000000000000000000002"
//! - Without prefix: "2"
//!
//! All of them parse to the same [`Address`]. Display always uses the full
//! lowercase form so that executed sequences print and serialize stably.

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Length of an address in bytes.
pub const ADDRESS_LENGTH: usize = 20;

/// A 20-byte account or contract address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; ADDRESS_LENGTH]);

impl Address {
    /// The all-zero address.
    pub const ZERO: Address = Address([0u8; ADDRESS_LENGTH]);

    /// Build an address whose low 8 bytes hold `value` (big-endian).
    ///
    /// # Examples
    ///
    /// ```
    /// use seqfuzz_types::Address;
    ///
    /// assert_eq!(Address::from_low_u64(0x10000).to_string(), "0x0000000000000000000000000000000000010000");
    /// ```
    pub fn from_low_u64(value: u64) -> Self {
        let mut bytes = [0u8; ADDRESS_LENGTH];
        bytes[ADDRESS_LENGTH - 8..].copy_from_slice(&value.to_be_bytes());
        Address(bytes)
    }

    /// Build an address from the last 20 bytes of a longer digest.
    pub fn from_digest_tail(digest: &[u8]) -> Self {
        let mut bytes = [0u8; ADDRESS_LENGTH];
        let start = digest.len().saturating_sub(ADDRESS_LENGTH);
        let tail = &digest[start..];
        bytes[ADDRESS_LENGTH - tail.len()..].copy_from_slice(tail);
        Address(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    /// Short display form with leading zeros trimmed ("0x2").
    pub fn to_short_string(&self) -> String {
        let full = hex::encode(self.0);
        let trimmed = full.trim_start_matches('0');
        if trimmed.is_empty() {
            "0x0".to_string()
        } else {
            format!("0x{}", trimmed)
        }
    }
}

impl FromStr for Address {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        if digits.is_empty() {
            return Err(anyhow!("Invalid address '{}': empty", s));
        }
        if digits.len() > ADDRESS_LENGTH * 2 {
            return Err(anyhow!(
                "Invalid address '{}': more than {} hex digits",
                s,
                ADDRESS_LENGTH * 2
            ));
        }
        let padded = format!("{:0>40}", digits);
        let decoded =
            hex::decode(&padded).map_err(|e| anyhow!("Invalid address '{}': {}", s, e))?;
        let mut bytes = [0u8; ADDRESS_LENGTH];
        bytes.copy_from_slice(&decoded);
        Ok(Address(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_short_string())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::from_str(&s).map_err(serde::de::Error::custom)
    }
}
