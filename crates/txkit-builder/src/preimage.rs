//! Signing preimage computation.
//!
//! Two algorithms, selected by the chain's capability entry:
//!
//! - **Legacy** (BTC-style): serializes a full transaction copy with the
//!   other inputs' unlock scripts blanked and the target input's script
//!   replaced by the spent output's locking script, then appends the
//!   4-byte sighash word.
//! - **Fork-id** (BCH-style, BIP-143 shape): commits to cached hashes of
//!   all outpoints, sequences, and outputs plus the spent value, avoiding
//!   the O(n²) reserialization the legacy method costs over n inputs.
//!
//! The fork-id caches are memoized per builder instance via `SighashCache`
//! and are never shared across builders.

use once_cell::sync::OnceCell;
use txkit_codec::{CompactSize, WireWriter};

use crate::hashes::sha256d;
use crate::input::{ScriptSlot, TxInput};
use crate::output::TxOutput;
use crate::sighash::{SigHash, SigHashType};
use crate::BuildError;

/// A borrowed view of the transaction being signed.
///
/// Both the builder (before the immutable `Transaction` exists) and test
/// code can construct one.
pub struct SigningView<'a> {
    /// Transaction format version.
    pub version: u32,
    /// Inputs in their finalized order.
    pub inputs: &'a [TxInput],
    /// Outputs in their finalized order.
    pub outputs: &'a [TxOutput],
    /// Lock time.
    pub lock_time: u32,
}

/// Memoized fork-id hashes, computed on first use within one builder's
/// lifetime.
#[derive(Debug, Default)]
pub struct SighashCache {
    prevouts: OnceCell<[u8; 32]>,
    sequences: OnceCell<[u8; 32]>,
    outputs: OnceCell<[u8; 32]>,
}

impl SighashCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    fn hash_prevouts(&self, view: &SigningView<'_>) -> [u8; 32] {
        *self.prevouts.get_or_init(|| {
            let mut writer = WireWriter::with_capacity(view.inputs.len() * 36);
            for input in view.inputs {
                writer.write_bytes(input.previous_output().txid.as_bytes());
                writer.write_u32_le(input.previous_output().index);
            }
            sha256d(writer.as_bytes())
        })
    }

    fn hash_sequences(&self, view: &SigningView<'_>) -> [u8; 32] {
        *self.sequences.get_or_init(|| {
            let mut writer = WireWriter::with_capacity(view.inputs.len() * 4);
            for input in view.inputs {
                writer.write_u32_le(input.sequence());
            }
            sha256d(writer.as_bytes())
        })
    }

    fn hash_all_outputs(&self, view: &SigningView<'_>) -> [u8; 32] {
        *self.outputs.get_or_init(|| {
            let mut writer = WireWriter::new();
            for output in view.outputs {
                output.write_to(&mut writer);
            }
            sha256d(writer.as_bytes())
        })
    }
}

fn spent_output<'a>(view: &'a SigningView<'_>, index: usize) -> Result<&'a TxOutput, BuildError> {
    let input = view
        .inputs
        .get(index)
        .ok_or(BuildError::InputIndexOutOfRange {
            index,
            count: view.inputs.len(),
        })?;
    input.spends().ok_or_else(|| {
        BuildError::SigningError("missing previous output on input".to_string())
    })
}

/// Compute the fork-id preimage for one input.
pub fn forkid_preimage(
    view: &SigningView<'_>,
    cache: &SighashCache,
    index: usize,
    sighash: &SigHash,
) -> Result<Vec<u8>, BuildError> {
    let spends = spent_output(view, index)?;
    let input = &view.inputs[index];

    let hash_prevouts = if sighash.anyone_can_pay() {
        [0u8; 32]
    } else {
        cache.hash_prevouts(view)
    };

    let hash_sequences = if sighash.anyone_can_pay() || sighash.ty() != SigHashType::All {
        [0u8; 32]
    } else {
        cache.hash_sequences(view)
    };

    let hash_outputs = match sighash.ty() {
        SigHashType::All => cache.hash_all_outputs(view),
        SigHashType::Single if index < view.outputs.len() => {
            sha256d(&view.outputs[index].to_bytes())
        }
        _ => [0u8; 32],
    };

    let mut writer = WireWriter::with_capacity(256);
    writer.write_u32_le(view.version);
    writer.write_bytes(&hash_prevouts);
    writer.write_bytes(&hash_sequences);
    writer.write_bytes(input.previous_output().txid.as_bytes());
    writer.write_u32_le(input.previous_output().index);
    let script_code = spends.script();
    writer.write_compact_size(CompactSize::from(script_code.len()));
    writer.write_bytes(script_code.as_bytes());
    writer.write_u64_le(spends.value());
    writer.write_u32_le(input.sequence());
    writer.write_bytes(&hash_outputs);
    writer.write_u32_le(view.lock_time);
    writer.write_u32_le(sighash.bits());
    Ok(writer.into_bytes())
}

/// Compute the legacy (txcopy) preimage for one input.
pub fn legacy_preimage(
    view: &SigningView<'_>,
    index: usize,
    sighash: &SigHash,
) -> Result<Vec<u8>, BuildError> {
    let spends = spent_output(view, index)?;
    let script_code = spends.script().clone();

    let mut writer = WireWriter::with_capacity(256);
    writer.write_u32_le(view.version);

    if sighash.anyone_can_pay() {
        // Only the signed input is committed.
        writer.write_compact_size(CompactSize(1));
        view.inputs[index].write_to(&mut writer, ScriptSlot::Replace(&script_code));
    } else {
        writer.write_compact_size(CompactSize::from(view.inputs.len()));
        for (i, input) in view.inputs.iter().enumerate() {
            if i == index {
                input.write_to(&mut writer, ScriptSlot::Replace(&script_code));
            } else if sighash.ty() == SigHashType::All {
                input.write_to(&mut writer, ScriptSlot::Blank);
            } else {
                // NONE/SINGLE free the other inputs' sequences.
                input.write_to_with_sequence(&mut writer, ScriptSlot::Blank, 0);
            }
        }
    }

    match sighash.ty() {
        SigHashType::All => {
            writer.write_compact_size(CompactSize::from(view.outputs.len()));
            for output in view.outputs {
                output.write_to(&mut writer);
            }
        }
        SigHashType::None => {
            writer.write_compact_size(CompactSize(0));
        }
        SigHashType::Single => {
            // Outputs up to and including the signed index; earlier ones
            // are blanked with value -1 and an empty script.
            let count = index + 1;
            writer.write_compact_size(CompactSize::from(count));
            for (i, output) in view.outputs.iter().take(count).enumerate() {
                if i == index {
                    output.write_to(&mut writer);
                } else {
                    writer.write_u64_le(u64::MAX);
                    writer.write_compact_size(CompactSize(0));
                }
            }
        }
    }

    writer.write_u32_le(view.lock_time);
    writer.write_u32_le(sighash.bits());
    Ok(writer.into_bytes())
}

/// Compute the 32-byte legacy signing digest for one input.
pub fn legacy_digest(
    view: &SigningView<'_>,
    index: usize,
    sighash: &SigHash,
) -> Result<[u8; 32], BuildError> {
    if sighash.ty() == SigHashType::Single && index >= view.outputs.len() {
        // Consensus quirk: SIGHASH_SINGLE with no matching output signs
        // the constant digest 1.
        let mut digest = [0u8; 32];
        digest[0] = 1;
        return Ok(digest);
    }
    Ok(sha256d(&legacy_preimage(view, index, sighash)?))
}

/// Compute the 32-byte fork-id signing digest for one input.
pub fn forkid_digest(
    view: &SigningView<'_>,
    cache: &SighashCache,
    index: usize,
    sighash: &SigHash,
) -> Result<[u8; 32], BuildError> {
    Ok(sha256d(&forkid_preimage(view, cache, index, sighash)?))
}
