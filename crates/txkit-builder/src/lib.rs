//! UTXO transaction construction.
//!
//! The heart of the wallet: value objects for outpoints, inputs, and
//! outputs; the immutable wire-format `Transaction`; per-chain signature
//! hashing (legacy and fork-id); and the `TransactionBuilder` state
//! machine that turns a funding request plus a supply of UTXOs into a
//! fully signed, canonically ordered transaction.

pub mod builder;
pub mod chain;
pub mod hashes;
pub mod input;
pub mod keyring;
pub mod outpoint;
pub mod output;
pub mod preimage;
pub mod request;
pub mod sighash;
pub mod transaction;
pub mod txid;

mod error;

pub use builder::TransactionBuilder;
pub use chain::{ChainId, ChainParams, SighashStyle};
pub use error::BuildError;
pub use input::TxInput;
pub use keyring::{InputSigner, KeyId, KeyService, PassphraseContext, PaymentCode, ProposalId};
pub use outpoint::{Outpoint, Utxo};
pub use output::TxOutput;
pub use request::{BuildRequest, NotificationRequest, OutputRequest};
pub use sighash::SigHash;
pub use transaction::Transaction;
pub use txid::TxId;

#[cfg(test)]
mod tests;
