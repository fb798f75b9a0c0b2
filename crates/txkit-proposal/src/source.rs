//! Collaborator seams for coin selection and network submission.
//!
//! Both sides of the manager are injected: the wallet database supplies
//! and reserves spendable coins, and the network layer submits finished
//! transactions. The manager itself holds no chain state.

use txkit_builder::{ProposalId, Transaction, Utxo};

use crate::ProposalError;

/// The wallet-database collaborator supplying spendable coins.
///
/// Reservation is exclusive per proposal: coins handed out for one
/// proposal are unavailable to every other caller until released or
/// spent. Release is idempotent.
pub trait UtxoSource: Send + Sync {
    /// Reserve coins worth at least `target` base units for a proposal.
    /// The source picks which coins; the builder takes them all.
    fn reserve_utxos(&self, proposal: &ProposalId, target: u64) -> Result<Vec<Utxo>, ProposalError>;

    /// Return every coin reserved for a proposal to the spendable pool.
    fn release_utxos(&self, proposal: &ProposalId);
}

/// Why a broadcast attempt did not land.
#[derive(Debug, Clone)]
pub enum BroadcastFailure {
    /// Transient network trouble; the same transaction can be resubmitted.
    Temporary(String),
    /// The network rejected the transaction itself; retrying is pointless.
    Permanent(String),
}

impl std::fmt::Display for BroadcastFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BroadcastFailure::Temporary(msg) => write!(f, "temporary: {}", msg),
            BroadcastFailure::Permanent(msg) => write!(f, "permanent: {}", msg),
        }
    }
}

/// The network collaborator that submits transactions to the chain.
pub trait Broadcaster: Send + Sync {
    /// Submit a signed transaction.
    fn broadcast(&self, tx: &Transaction) -> Result<(), BroadcastFailure>;
}
