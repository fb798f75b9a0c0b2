use txkit_builder::{BuildError, ProposalId};

/// Error types for the proposal lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum ProposalError {
    /// A proposal with the same identifier is already queued.
    #[error("duplicate proposal: {0}")]
    Duplicate(ProposalId),

    /// The proposal aged out before a transaction could be broadcast.
    #[error("proposal expired: {0}")]
    Expired(ProposalId),

    /// The UTXO source could not reserve enough value.
    #[error("no spendable utxos: {0}")]
    NoSpendableUtxos(String),

    /// Transaction construction failed permanently.
    #[error(transparent)]
    Build(#[from] BuildError),

    /// The broadcaster refused the transaction permanently.
    #[error("broadcast rejected: {0}")]
    Broadcast(String),

    /// Manager invariant violation (poisoned lock).
    #[error("internal error: {0}")]
    Internal(String),
}
