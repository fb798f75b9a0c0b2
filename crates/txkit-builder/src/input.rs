//! Transaction input value object.
//!
//! Wraps a UTXO reference plus the mutable signing state: sequence
//! number, the unlock script once signed, and the key identifiers
//! required to produce a valid signature. Inputs become read-only once
//! signing succeeds.

use txkit_codec::{CompactSize, WireReader, WireWriter};
use txkit_script::{opcodes, template, Script};

use crate::hashes::hash160;
use crate::keyring::KeyId;
use crate::outpoint::Outpoint;
use crate::output::TxOutput;
use crate::txid::TxId;
use crate::BuildError;

/// Default sequence number indicating a finalized input.
pub const DEFAULT_SEQUENCE: u32 = 0xFFFF_FFFF;

/// Worst-case scriptSig length for a P2PKH spend:
/// push(72-byte DER sig + hash byte) + push(33-byte compressed key).
const P2PKH_UNLOCK_ESTIMATE: usize = 108;

/// How an input's script field is rendered while serializing a signing
/// preimage: as-is, blanked, or substituted with the spent output's
/// locking script (the legacy scriptCode substitution).
#[derive(Debug, Clone, Copy)]
pub enum ScriptSlot<'a> {
    /// Write the unlock script the input currently holds.
    Actual,
    /// Write a zero-length script.
    Blank,
    /// Substitute the given script (the signing subscript).
    Replace(&'a Script),
}

/// A single input of a transaction under construction.
#[derive(Debug, Clone)]
pub struct TxInput {
    outpoint: Outpoint,
    sequence: u32,
    unlock_script: Option<Script>,
    /// The previous output being spent. Present on builder-created
    /// inputs; absent on inputs decoded from the wire.
    spends: Option<TxOutput>,
    keys: Vec<KeyId>,
}

impl TxInput {
    /// Create an input spending the given previous output.
    pub fn new(outpoint: Outpoint, spends: TxOutput, keys: Vec<KeyId>) -> Self {
        TxInput {
            outpoint,
            sequence: DEFAULT_SEQUENCE,
            unlock_script: None,
            spends: Some(spends),
            keys,
        }
    }

    /// Deserialize an input from a wire reader: txid(32), vout(4 LE),
    /// script length + script, sequence(4 LE). The spent output is
    /// unknown for decoded inputs.
    pub fn read_from(reader: &mut WireReader) -> Result<Self, BuildError> {
        let txid_bytes = reader
            .read_bytes(32)
            .map_err(|e| BuildError::SerializationError(format!("reading prev txid: {}", e)))?;
        let txid = TxId::from_slice(txid_bytes)?;
        let index = reader
            .read_u32_le()
            .map_err(|e| BuildError::SerializationError(format!("reading prev index: {}", e)))?;
        let script_len = reader
            .read_compact_size()
            .map_err(|e| BuildError::SerializationError(format!("reading script length: {}", e)))?;
        let script_bytes = reader
            .read_bytes(script_len.value() as usize)
            .map_err(|e| BuildError::SerializationError(format!("reading unlock script: {}", e)))?;
        let sequence = reader
            .read_u32_le()
            .map_err(|e| BuildError::SerializationError(format!("reading sequence: {}", e)))?;
        Ok(TxInput {
            outpoint: Outpoint::new(txid, index),
            sequence,
            unlock_script: if script_bytes.is_empty() {
                None
            } else {
                Some(Script::from_bytes(script_bytes))
            },
            spends: None,
            keys: Vec::new(),
        })
    }

    /// The previous-output reference.
    pub fn previous_output(&self) -> &Outpoint {
        &self.outpoint
    }

    /// The sequence number.
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// The previous output being spent, if known.
    pub fn spends(&self) -> Option<&TxOutput> {
        self.spends.as_ref()
    }

    /// The value of the spent output, if known.
    pub fn value(&self) -> Option<u64> {
        self.spends.as_ref().map(|o| o.value())
    }

    /// Keys required to sign this input.
    pub fn keys(&self) -> &[KeyId] {
        &self.keys
    }

    /// The unlock script, once signed.
    pub fn unlock_script(&self) -> Option<&Script> {
        self.unlock_script.as_ref()
    }

    /// Whether the input has been signed.
    pub fn is_signed(&self) -> bool {
        self.unlock_script.is_some()
    }

    /// Number of signatures the spent script requires.
    fn required_signatures(&self) -> Result<usize, BuildError> {
        let spends = self.spends.as_ref().ok_or_else(|| {
            BuildError::SigningError("missing previous output on input".to_string())
        })?;
        let script = spends.script();
        if script.is_p2pkh() || script.is_p2pk() {
            Ok(1)
        } else if script.is_multisig_out() {
            let chunks = script.chunks()?;
            let m = chunks[0].op - opcodes::OP_1 + 1;
            Ok(m as usize)
        } else {
            Err(BuildError::UnsupportedOutputType(format!(
                "cannot build unlock script for {}",
                script.to_hex()
            )))
        }
    }

    /// Assemble the unlock script from signature/pubkey pairs.
    ///
    /// Each signature already carries its trailing sighash byte. Fails if
    /// the pair count does not match what the spent script requires, or
    /// if script construction fails (e.g. a pubkey that does not hash to
    /// the P2PKH script's key hash).
    pub fn add_signatures(&mut self, pairs: &[(Vec<u8>, Vec<u8>)]) -> Result<(), BuildError> {
        let expected = self.required_signatures()?;
        if pairs.len() != expected {
            return Err(BuildError::SignatureCountMismatch {
                expected,
                got: pairs.len(),
            });
        }
        let spends = self.spends.as_ref().ok_or_else(|| {
            BuildError::SigningError("missing previous output on input".to_string())
        })?;
        let script = spends.script();

        let unlock = if script.is_p2pkh() {
            let (sig, pubkey) = &pairs[0];
            if hash160(pubkey) != script.public_key_hash()? {
                return Err(BuildError::SigningError(
                    "public key does not match spent script".to_string(),
                ));
            }
            template::unlock_p2pkh(sig, pubkey)?
        } else if script.is_p2pk() {
            let mut s = Script::new();
            s.append_push_data(&pairs[0].0)?;
            s
        } else {
            let sigs: Vec<&[u8]> = pairs.iter().map(|(sig, _)| sig.as_slice()).collect();
            template::unlock_multisig(&sigs)?
        };
        self.unlock_script = Some(unlock);
        Ok(())
    }

    /// Estimated unlock-script length for fee calculation, by spent
    /// script form. Unknown forms get a conservative P2PKH-sized guess.
    pub fn estimated_unlock_len(&self) -> usize {
        let script = match self.spends.as_ref() {
            Some(out) => out.script(),
            None => return P2PKH_UNLOCK_ESTIMATE,
        };
        if script.is_p2pkh() {
            P2PKH_UNLOCK_ESTIMATE
        } else if script.is_p2pk() {
            73
        } else if script.is_multisig_out() {
            match self.required_signatures() {
                Ok(m) => 1 + m * 73,
                Err(_) => P2PKH_UNLOCK_ESTIMATE,
            }
        } else {
            P2PKH_UNLOCK_ESTIMATE
        }
    }

    /// Serialized byte length: outpoint(36) + CompactSize(script len) +
    /// script + sequence(4). Uses the actual unlock script when signed,
    /// the per-form estimate otherwise.
    pub fn calculate_size(&self) -> usize {
        let script_len = match &self.unlock_script {
            Some(s) => s.len(),
            None => self.estimated_unlock_len(),
        };
        36 + CompactSize::from(script_len).size() + script_len + 4
    }

    /// Append the wire encoding to a writer, rendering the script field
    /// per `slot`.
    pub fn write_to(&self, writer: &mut WireWriter, slot: ScriptSlot<'_>) {
        writer.write_bytes(self.outpoint.txid.as_bytes());
        writer.write_u32_le(self.outpoint.index);
        let script_bytes: &[u8] = match slot {
            ScriptSlot::Actual => self
                .unlock_script
                .as_ref()
                .map(|s| s.as_bytes())
                .unwrap_or(&[]),
            ScriptSlot::Blank => &[],
            ScriptSlot::Replace(script) => script.as_bytes(),
        };
        writer.write_compact_size(CompactSize::from(script_bytes.len()));
        writer.write_bytes(script_bytes);
        writer.write_u32_le(self.sequence);
    }

    /// Like `write_to`, but with an overridden sequence number (legacy
    /// NONE/SINGLE preimages zero the other inputs' sequences).
    pub fn write_to_with_sequence(
        &self,
        writer: &mut WireWriter,
        slot: ScriptSlot<'_>,
        sequence: u32,
    ) {
        writer.write_bytes(self.outpoint.txid.as_bytes());
        writer.write_u32_le(self.outpoint.index);
        let script_bytes: &[u8] = match slot {
            ScriptSlot::Actual => self
                .unlock_script
                .as_ref()
                .map(|s| s.as_bytes())
                .unwrap_or(&[]),
            ScriptSlot::Blank => &[],
            ScriptSlot::Replace(script) => script.as_bytes(),
        };
        writer.write_compact_size(CompactSize::from(script_bytes.len()));
        writer.write_bytes(script_bytes);
        writer.write_u32_le(sequence);
    }
}
