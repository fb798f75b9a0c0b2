//! The immutable, finalized transaction.
//!
//! # Wire format
//!
//! | Field        | Size                      |
//! |--------------|---------------------------|
//! | version      | 4 bytes (LE)              |
//! | input count  | CompactSize               |
//! | inputs       | variable (per input)      |
//! | output count | CompactSize               |
//! | outputs      | variable (per output)     |
//! | lock_time    | 4 bytes (LE)              |
//!
//! Bit-exact compatibility with the target chain's consensus
//! serialization: no extra fields, and the input/output order is frozen
//! at construction (canonical ordering happens in the builder, before
//! signing).

use txkit_codec::{CompactSize, WireReader, WireWriter};

use crate::hashes::sha256d;
use crate::input::{ScriptSlot, TxInput};
use crate::output::TxOutput;
use crate::txid::TxId;
use crate::BuildError;

/// Default transaction format version.
pub const DEFAULT_VERSION: u32 = 1;

/// A finalized transaction. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct Transaction {
    version: u32,
    inputs: Vec<TxInput>,
    outputs: Vec<TxOutput>,
    lock_time: u32,
}

impl Transaction {
    /// Assemble a transaction from its finalized parts.
    pub fn new(version: u32, inputs: Vec<TxInput>, outputs: Vec<TxOutput>, lock_time: u32) -> Self {
        Transaction {
            version,
            inputs,
            outputs,
            lock_time,
        }
    }

    /// Parse a transaction from a hex string.
    pub fn from_hex(hex_str: &str) -> Result<Self, BuildError> {
        let bytes = hex::decode(hex_str)
            .map_err(|e| BuildError::SerializationError(format!("invalid hex: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    /// Parse a transaction from raw bytes.
    ///
    /// The slice must contain exactly one transaction; trailing bytes are
    /// rejected.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BuildError> {
        let mut reader = WireReader::new(bytes);
        let tx = Self::read_from(&mut reader)?;
        if reader.remaining() != 0 {
            return Err(BuildError::SerializationError(format!(
                "trailing {} bytes after transaction",
                reader.remaining()
            )));
        }
        Ok(tx)
    }

    /// Deserialize a transaction from a wire reader.
    pub fn read_from(reader: &mut WireReader) -> Result<Self, BuildError> {
        let version = reader
            .read_u32_le()
            .map_err(|e| BuildError::SerializationError(format!("reading version: {}", e)))?;

        let input_count = reader
            .read_compact_size()
            .map_err(|e| BuildError::SerializationError(format!("reading input count: {}", e)))?;
        // Every input occupies at least one byte, so a count past the
        // remaining data is malformed. Checking up front also keeps the
        // announced count from driving the Vec allocation.
        if input_count.value() > reader.remaining() as u64 {
            return Err(BuildError::SerializationError(format!(
                "input count {} exceeds {} remaining bytes",
                input_count.value(),
                reader.remaining()
            )));
        }
        let mut inputs = Vec::with_capacity(input_count.value() as usize);
        for _ in 0..input_count.value() {
            inputs.push(TxInput::read_from(reader)?);
        }

        let output_count = reader
            .read_compact_size()
            .map_err(|e| BuildError::SerializationError(format!("reading output count: {}", e)))?;
        if output_count.value() > reader.remaining() as u64 {
            return Err(BuildError::SerializationError(format!(
                "output count {} exceeds {} remaining bytes",
                output_count.value(),
                reader.remaining()
            )));
        }
        let mut outputs = Vec::with_capacity(output_count.value() as usize);
        for i in 0..output_count.value() {
            let mut output = TxOutput::read_from(reader)?;
            output.set_index(i as u32);
            outputs.push(output);
        }

        let lock_time = reader
            .read_u32_le()
            .map_err(|e| BuildError::SerializationError(format!("reading lock time: {}", e)))?;

        Ok(Transaction {
            version,
            inputs,
            outputs,
            lock_time,
        })
    }

    /// Serialize to canonical wire bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = WireWriter::with_capacity(256);
        writer.write_u32_le(self.version);

        writer.write_compact_size(CompactSize::from(self.inputs.len()));
        for input in &self.inputs {
            input.write_to(&mut writer, ScriptSlot::Actual);
        }

        writer.write_compact_size(CompactSize::from(self.outputs.len()));
        for output in &self.outputs {
            output.write_to(&mut writer);
        }

        writer.write_u32_le(self.lock_time);
        writer.into_bytes()
    }

    /// Serialize to a lowercase hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// The transaction id: sha256d of the serialized bytes, internal order.
    pub fn txid(&self) -> TxId {
        TxId::new(sha256d(&self.to_bytes()))
    }

    /// The transaction id as the conventional byte-reversed hex string.
    pub fn txid_hex(&self) -> String {
        self.txid().to_hex()
    }

    /// Format version.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Lock time.
    pub fn lock_time(&self) -> u32 {
        self.lock_time
    }

    /// The ordered inputs.
    pub fn inputs(&self) -> &[TxInput] {
        &self.inputs
    }

    /// The ordered outputs.
    pub fn outputs(&self) -> &[TxOutput] {
        &self.outputs
    }

    /// Sum of all output values.
    pub fn total_output_value(&self) -> u64 {
        self.outputs.iter().map(|o| o.value()).sum()
    }

    /// Serialized byte length.
    pub fn size(&self) -> usize {
        self.to_bytes().len()
    }

    /// Whether this is a coinbase transaction: exactly one input with an
    /// all-zero previous txid and a maxed output index or sequence.
    pub fn is_coinbase(&self) -> bool {
        if self.inputs.len() != 1 {
            return false;
        }
        let input = &self.inputs[0];
        if input.previous_output().txid != TxId::new([0u8; 32]) {
            return false;
        }
        input.previous_output().index == 0xFFFF_FFFF || input.sequence() == 0xFFFF_FFFF
    }
}

impl std::fmt::Display for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
