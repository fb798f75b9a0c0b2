//! Transaction identifier.
//!
//! A 32-byte double-SHA256 hash stored in internal (little-endian) byte
//! order and displayed byte-reversed, following the Bitcoin convention.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::BuildError;

/// Size of a transaction id in bytes.
pub const TXID_SIZE: usize = 32;

/// A transaction identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, PartialOrd, Ord)]
pub struct TxId([u8; TXID_SIZE]);

impl TxId {
    /// Create a TxId from raw internal-order bytes.
    pub fn new(bytes: [u8; TXID_SIZE]) -> Self {
        TxId(bytes)
    }

    /// Create a TxId from a slice that must be exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, BuildError> {
        if bytes.len() != TXID_SIZE {
            return Err(BuildError::SerializationError(format!(
                "invalid txid length {}, want {}",
                bytes.len(),
                TXID_SIZE
            )));
        }
        let mut arr = [0u8; TXID_SIZE];
        arr.copy_from_slice(bytes);
        Ok(TxId(arr))
    }

    /// Parse a TxId from its display-order (byte-reversed) hex string.
    pub fn from_hex(hex_str: &str) -> Result<Self, BuildError> {
        let mut bytes = hex::decode(hex_str)
            .map_err(|e| BuildError::SerializationError(format!("invalid txid hex: {}", e)))?;
        bytes.reverse();
        Self::from_slice(&bytes)
    }

    /// The internal-order bytes (as serialized on the wire).
    pub fn as_bytes(&self) -> &[u8; TXID_SIZE] {
        &self.0
    }

    /// The display-order bytes (reversed), as used by BIP-69 comparison
    /// and human-readable output.
    pub fn display_bytes(&self) -> [u8; TXID_SIZE] {
        let mut out = self.0;
        out.reverse();
        out
    }

    /// The display-order hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.display_bytes())
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for TxId {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for TxId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for TxId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        TxId::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
