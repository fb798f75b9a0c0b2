#![deny(missing_docs)]

//! Wallet transaction toolkit - complete SDK.
//!
//! Re-exports all toolkit components for convenient single-crate usage.

pub use txkit_builder as builder;
pub use txkit_codec as codec;
pub use txkit_proposal as proposal;
pub use txkit_script as script;
