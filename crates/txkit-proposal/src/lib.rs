//! Payment proposal lifecycle management.
//!
//! A proposal is a durable request to make a payment. The manager owns
//! the queue of open proposals, turns each into a signed transaction via
//! the builder, hands it to the broadcaster, and keeps rebroadcasting
//! until the surrounding application reports chain confirmation. Each
//! caller gets a one-shot completion channel resolving to the final txid
//! or the reason the proposal died.

pub mod manager;
pub mod proposal;
pub mod source;

mod error;

pub use error::ProposalError;
pub use manager::{ManagerConfig, ProposalManager};
pub use proposal::Proposal;
pub use source::{BroadcastFailure, Broadcaster, UtxoSource};
