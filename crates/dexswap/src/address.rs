use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tiny_keccak::{Hasher, Keccak};

use crate::error::AbiError;

/// A 20-byte EVM (solidity) address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    /// Sentinel connector meaning "no intermediate hop" for oracle queries.
    pub const NO_CONNECTOR: Address = Address([0xff; 20]);

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// EIP-55 mixed-case checksum encoding.
    pub fn to_checksum(&self) -> String {
        let hex_addr = hex::encode(self.0);
        let mut hasher = Keccak::v256();
        hasher.update(hex_addr.as_bytes());
        let mut hash = [0u8; 32];
        hasher.finalize(&mut hash);

        let mut result = String::with_capacity(42);
        result.push_str("0x");
        for (i, c) in hex_addr.chars().enumerate() {
            let hash_nibble = if i % 2 == 0 {
                (hash[i / 2] >> 4) & 0x0f
            } else {
                hash[i / 2] & 0x0f
            };
            if hash_nibble >= 8 {
                result.push(c.to_ascii_uppercase());
            } else {
                result.push(c);
            }
        }
        result
    }
}

impl FromStr for Address {
    type Err = AbiError;

    /// Parses `0x`-prefixed or bare hex, case-insensitive. Checksums are not enforced.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if digits.len() != 40 {
            return Err(AbiError::InvalidAddress(format!(
                "expected 40 hex digits, got {}: {s}",
                digits.len()
            )));
        }
        let bytes = hex::decode(digits).map_err(|e| AbiError::InvalidAddress(format!("{s}: {e}")))?;
        let mut addr = [0u8; 20];
        addr.copy_from_slice(&bytes);
        Ok(Address(addr))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_checksum())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
