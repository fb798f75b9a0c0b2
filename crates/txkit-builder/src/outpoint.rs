//! Previous-output references and spendable UTXOs.

use serde::{Deserialize, Serialize};
use txkit_script::Script;

use crate::keyring::KeyId;
use crate::txid::TxId;

/// Reference to a specific output of a prior transaction.
///
/// Immutable once constructed; used as an equality and ordering key.
/// The ordering is the BIP-69 input ordering: previous txid compared in
/// display byte order, ties broken by output index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Outpoint {
    /// Id of the transaction that created the output.
    pub txid: TxId,
    /// Index of the output within that transaction.
    pub index: u32,
}

impl Outpoint {
    /// Create an outpoint.
    pub fn new(txid: TxId, index: u32) -> Self {
        Outpoint { txid, index }
    }

    /// The BIP-69 comparison key.
    fn bip69_key(&self) -> ([u8; 32], u32) {
        (self.txid.display_bytes(), self.index)
    }
}

impl std::fmt::Display for Outpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.txid, self.index)
    }
}

impl Ord for Outpoint {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.bip69_key().cmp(&other.bip69_key())
    }
}

impl PartialOrd for Outpoint {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// An unspent transaction output handed to the builder.
///
/// Sourced from the external wallet database, which owns its lifecycle
/// and reservation bookkeeping; read-only from the builder's perspective.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utxo {
    /// The output this UTXO refers to.
    pub outpoint: Outpoint,
    /// Value in the chain's base unit (satoshis).
    pub value: u64,
    /// The locking script of the output.
    pub script: Script,
    /// Keys able to produce a valid unlock for the script.
    pub key_ids: Vec<KeyId>,
}

impl Utxo {
    /// Create a UTXO record.
    pub fn new(outpoint: Outpoint, value: u64, script: Script, key_ids: Vec<KeyId>) -> Self {
        Utxo {
            outpoint,
            value,
            script,
            key_ids,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn txid_with_first_display_byte(b: u8) -> TxId {
        // Display order reverses the internal bytes, so set the last one.
        let mut bytes = [0u8; 32];
        bytes[31] = b;
        TxId::new(bytes)
    }

    #[test]
    fn ordering_is_display_bytes_then_index() {
        let a = Outpoint::new(txid_with_first_display_byte(1), 5);
        let b = Outpoint::new(txid_with_first_display_byte(2), 0);
        assert!(a < b);

        let c = Outpoint::new(txid_with_first_display_byte(1), 6);
        assert!(a < c);
    }
}
