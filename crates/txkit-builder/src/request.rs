//! Requested payment contents, before any transaction exists.
//!
//! A `BuildRequest` is the serializable description of what a finished
//! transaction must pay. It carries no chain state, no keys, and no fee
//! arithmetic; the builder turns it into concrete outputs.

use serde::{Deserialize, Serialize};

use crate::keyring::PaymentCode;
use crate::BuildError;
use txkit_script::{template, Script};

/// One requested payment output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputRequest {
    /// Pay to a public key hash.
    PubkeyHash {
        /// Amount in the chain's base unit.
        value: u64,
        /// 20-byte hash160 of the recipient key.
        #[serde(with = "hex_bytes_20")]
        pubkey_hash: [u8; 20],
    },
    /// Pay to a script hash.
    ScriptHash {
        /// Amount in the chain's base unit.
        value: u64,
        /// 20-byte hash160 of the redeem script.
        #[serde(with = "hex_bytes_20")]
        script_hash: [u8; 20],
    },
    /// Pay directly to a public key.
    RawPubkey {
        /// Amount in the chain's base unit.
        value: u64,
        /// SEC-encoded public key.
        #[serde(with = "hex_bytes")]
        pubkey: Vec<u8>,
    },
    /// Pay to a bare m-of-n multisig.
    Multisig {
        /// Amount in the chain's base unit.
        value: u64,
        /// Signatures required.
        required: usize,
        /// SEC-encoded public keys.
        #[serde(with = "hex_bytes_vec")]
        pubkeys: Vec<Vec<u8>>,
    },
}

impl OutputRequest {
    /// The requested amount.
    pub fn value(&self) -> u64 {
        match self {
            OutputRequest::PubkeyHash { value, .. }
            | OutputRequest::ScriptHash { value, .. }
            | OutputRequest::RawPubkey { value, .. }
            | OutputRequest::Multisig { value, .. } => *value,
        }
    }

    /// Build the locking script for this request.
    pub fn locking_script(&self) -> Result<Script, BuildError> {
        match self {
            OutputRequest::PubkeyHash { pubkey_hash, .. } => Ok(template::lock_p2pkh(pubkey_hash)),
            OutputRequest::ScriptHash { script_hash, .. } => Ok(template::lock_p2sh(script_hash)),
            OutputRequest::RawPubkey { pubkey, .. } => Ok(template::lock_p2pk(pubkey)?),
            OutputRequest::Multisig {
                required, pubkeys, ..
            } => {
                let keys: Vec<&[u8]> = pubkeys.iter().map(|k| k.as_slice()).collect();
                Ok(template::lock_multisig(*required, &keys)?)
            }
        }
    }
}

/// A request to notify a remote payment code of a new payment channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequest {
    /// The remote party's payment code.
    pub remote_code: PaymentCode,
}

/// Everything a proposal asks the builder to pay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRequest {
    /// Requested payment outputs.
    pub outputs: Vec<OutputRequest>,
    /// Payment-code notifications to embed; at most one is accepted.
    #[serde(default)]
    pub notifications: Vec<NotificationRequest>,
    /// Fee rate in base units per 1000 bytes.
    pub fee_rate: u64,
    /// Optional payee label carried through to the outputs.
    #[serde(default)]
    pub payee: Option<String>,
}

impl BuildRequest {
    /// Sum of all requested output values.
    pub fn total_value(&self) -> u64 {
        self.outputs.iter().map(|o| o.value()).sum()
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}

mod hex_bytes_20 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 20], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 20], D::Error> {
        let s = String::deserialize(deserializer)?;
        let raw = hex::decode(&s).map_err(serde::de::Error::custom)?;
        raw.try_into()
            .map_err(|_| serde::de::Error::custom("expected 20 hex-encoded bytes"))
    }
}

mod hex_bytes_vec {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(keys: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error> {
        let encoded: Vec<String> = keys.iter().map(hex::encode).collect();
        serde::Serialize::serialize(&encoded, serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<Vec<u8>>, D::Error> {
        let encoded = Vec::<String>::deserialize(deserializer)?;
        encoded
            .into_iter()
            .map(|s| hex::decode(&s).map_err(serde::de::Error::custom))
            .collect()
    }
}
