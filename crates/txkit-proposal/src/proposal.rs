//! The durable payment proposal record.

use serde::{Deserialize, Serialize};

use txkit_builder::{BuildRequest, ChainId, ProposalId};

/// A queued request to make one payment on one chain.
///
/// Proposals are plain data: everything needed to (re)build the
/// transaction, and nothing that is chain or wallet state. They
/// serialize to JSON so the application can persist its queue across
/// restarts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    /// Caller-assigned unique identifier.
    pub id: ProposalId,
    /// Target chain.
    pub chain: ChainId,
    /// What the transaction must pay.
    pub request: BuildRequest,
}

impl Proposal {
    /// Create a proposal.
    pub fn new(id: ProposalId, chain: ChainId, request: BuildRequest) -> Self {
        Proposal { id, chain, request }
    }

    /// Serialize to JSON for persistence.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parse a persisted proposal.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
