//! Wire-format codec primitives for UTXO-family chains.
//!
//! Provides the CompactSize variable-length integer together with
//! cursor-based `WireReader`/`WireWriter` types used by transaction
//! serialization throughout the workspace.

pub mod compact_size;
pub mod io;

mod error;
pub use compact_size::CompactSize;
pub use error::CodecError;
pub use io::{WireReader, WireWriter};
