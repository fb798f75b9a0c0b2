//! Script handling for UTXO-family transactions.
//!
//! Provides the `Script` value type, opcode constants, chunk parsing,
//! output-script classification, and constructors for the standard
//! locking and unlocking script forms the transaction builder emits.

pub mod opcodes;
pub mod script;
pub mod template;

mod error;
pub use error::ScriptError;
pub use script::{Script, ScriptChunk};
