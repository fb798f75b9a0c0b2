//! Signature-hash descriptor.
//!
//! Represents the sighash flag set appropriate to one target chain. The
//! base type (ALL/NONE/SINGLE) and the anyone-can-pay bit control what a
//! signature commits to; fork-style chains additionally require a fork-id
//! bit for replay protection.

use crate::chain::{ChainParams, SIGHASH_FORKID};

/// Sign all inputs and all outputs (the default).
pub const SIGHASH_ALL: u32 = 0x01;

/// Sign all inputs but no outputs, allowing outputs to be modified.
pub const SIGHASH_NONE: u32 = 0x02;

/// Sign all inputs and only the output with the same index as the signed input.
pub const SIGHASH_SINGLE: u32 = 0x03;

/// Only sign the current input, allowing other inputs to be added later.
pub const SIGHASH_ANYONECANPAY: u32 = 0x80;

/// Mask applied to extract the base sighash type.
pub const SIGHASH_MASK: u32 = 0x1f;

/// The base sighash type: which outputs a signature commits to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigHashType {
    /// Commit to every output.
    All,
    /// Commit to no outputs.
    None,
    /// Commit to the output at the signed input's index only.
    Single,
}

/// A per-chain signature-hash flag set. Pure value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigHash {
    flags: u32,
}

impl SigHash {
    /// The default descriptor for a chain: ALL plus whatever extra flag
    /// bits the chain's capability entry requires.
    pub fn for_chain(params: &ChainParams) -> Self {
        SigHash {
            flags: SIGHASH_ALL | params.fork_flags,
        }
    }

    /// Build a descriptor from an explicit base type and modifiers.
    pub fn new(ty: SigHashType, anyone_can_pay: bool, params: &ChainParams) -> Self {
        let base = match ty {
            SigHashType::All => SIGHASH_ALL,
            SigHashType::None => SIGHASH_NONE,
            SigHashType::Single => SIGHASH_SINGLE,
        };
        let acp = if anyone_can_pay { SIGHASH_ANYONECANPAY } else { 0 };
        SigHash {
            flags: base | acp | params.fork_flags,
        }
    }

    /// The base type this flag set encodes.
    pub fn ty(&self) -> SigHashType {
        match self.flags & SIGHASH_MASK {
            SIGHASH_NONE => SigHashType::None,
            SIGHASH_SINGLE => SigHashType::Single,
            _ => SigHashType::All,
        }
    }

    /// Whether the anyone-can-pay bit is set.
    pub fn anyone_can_pay(&self) -> bool {
        self.flags & SIGHASH_ANYONECANPAY != 0
    }

    /// Whether the fork-id replay-protection bit is set.
    pub fn has_fork_id(&self) -> bool {
        self.flags & SIGHASH_FORKID != 0
    }

    /// The full flag word, appended to preimages as 4 bytes LE.
    pub fn bits(&self) -> u32 {
        self.flags
    }

    /// The low flag byte, appended to signatures inside unlock scripts.
    pub fn as_byte(&self) -> u8 {
        self.flags as u8
    }
}
