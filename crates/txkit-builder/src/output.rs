//! Transaction output value object.
//!
//! Holds the satoshi value, locking script, and local-only annotations:
//! the key identifiers able to unlock the output, the payee/payer contact
//! labels shown in the UI, and the change flag used by fee calculation.
//! None of the annotations are consensus-relevant or serialized.

use txkit_codec::{CodecError, CompactSize, WireReader, WireWriter};
use txkit_script::Script;

use crate::keyring::KeyId;
use crate::BuildError;

/// A single output of a transaction under construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutput {
    index: u32,
    value: u64,
    script: Script,
    keys: Vec<KeyId>,
    payee: Option<String>,
    payer: Option<String>,
    change: bool,
}

impl TxOutput {
    /// Create an output with a fixed value (a requested output).
    pub fn new(value: u64, script: Script, keys: Vec<KeyId>) -> Self {
        TxOutput {
            index: 0,
            value,
            script,
            keys,
            payee: None,
            payer: None,
            change: false,
        }
    }

    /// Create a provisional change output. Its value is zero until
    /// finalization assigns the excess exactly once.
    pub fn new_change(script: Script, keys: Vec<KeyId>) -> Self {
        let mut out = Self::new(0, script, keys);
        out.change = true;
        out
    }

    /// Deserialize an output from a wire reader: value(8 LE), script
    /// length (CompactSize), script bytes.
    pub fn read_from(reader: &mut WireReader) -> Result<Self, BuildError> {
        let value = reader
            .read_u64_le()
            .map_err(|e| BuildError::SerializationError(format!("reading value: {}", e)))?;
        let script_len = reader
            .read_compact_size()
            .map_err(|e| BuildError::SerializationError(format!("reading script length: {}", e)))?;
        let script_bytes = reader
            .read_bytes(script_len.value() as usize)
            .map_err(|e| BuildError::SerializationError(format!("reading script: {}", e)))?;
        Ok(TxOutput::new(value, Script::from_bytes(script_bytes), Vec::new()))
    }

    /// The output's position within the transaction.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Rewrite the position. Used only during canonical reordering.
    pub fn set_index(&mut self, index: u32) {
        self.index = index;
    }

    /// The output value.
    pub fn value(&self) -> u64 {
        self.value
    }

    /// Set the output value. For change outputs this happens exactly once,
    /// at finalization.
    pub fn set_value(&mut self, value: u64) {
        self.value = value;
    }

    /// The locking script.
    pub fn script(&self) -> &Script {
        &self.script
    }

    /// Key identifiers able to unlock this output.
    pub fn keys(&self) -> &[KeyId] {
        &self.keys
    }

    /// Annotate the receiving contact. UI-only, best-effort.
    pub fn set_payee(&mut self, payee: impl Into<String>) {
        self.payee = Some(payee.into());
    }

    /// Annotate the paying contact. UI-only, best-effort.
    pub fn set_payer(&mut self, payer: impl Into<String>) {
        self.payer = Some(payer.into());
    }

    /// The receiving contact annotation, if any.
    pub fn payee(&self) -> Option<&str> {
        self.payee.as_deref()
    }

    /// Whether this is the change output.
    pub fn is_change(&self) -> bool {
        self.change
    }

    /// Serialized byte length: value(8) + CompactSize(script len) + script.
    pub fn calculate_size(&self) -> usize {
        let len = self.script.len();
        8 + CompactSize::from(len).size() + len
    }

    /// Serialize into a caller-provided buffer.
    ///
    /// # Returns
    /// `Ok(bytes_written)`, or an error if the buffer is smaller than
    /// `calculate_size()`. Nothing is written on failure.
    pub fn serialize_into(&self, dst: &mut [u8]) -> Result<usize, BuildError> {
        let need = self.calculate_size();
        if dst.len() < need {
            return Err(BuildError::Codec(CodecError::BufferTooSmall {
                need,
                have: dst.len(),
            }));
        }
        dst[0..8].copy_from_slice(&self.value.to_le_bytes());
        let mut pos = 8;
        pos += CompactSize::from(self.script.len()).encode_into(&mut dst[pos..])?;
        dst[pos..pos + self.script.len()].copy_from_slice(self.script.as_bytes());
        Ok(pos + self.script.len())
    }

    /// Append the wire encoding to a writer.
    pub fn write_to(&self, writer: &mut WireWriter) {
        writer.write_u64_le(self.value);
        writer.write_compact_size(CompactSize::from(self.script.len()));
        writer.write_bytes(self.script.as_bytes());
    }

    /// Serialize to a fresh byte vector.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = WireWriter::with_capacity(self.calculate_size());
        self.write_to(&mut writer);
        writer.into_bytes()
    }

    /// The BIP-69 output ordering key: value ascending, ties broken by
    /// lexicographic script byte comparison.
    pub fn bip69_key(&self) -> (u64, &[u8]) {
        (self.value, self.script.as_bytes())
    }
}
