//! The Script value type.
//!
//! A script is an opaque byte sequence. This module provides parsing into
//! push/opcode chunks, classification of the standard output forms, and
//! append helpers that apply the minimal PUSHDATA prefix.

use crate::opcodes::*;
use crate::ScriptError;

/// A parsed element of a script: an opcode, optionally carrying push data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptChunk {
    /// The opcode byte (for direct pushes, the length byte itself).
    pub op: u8,
    /// Push payload, if this chunk pushes data.
    pub data: Option<Vec<u8>>,
}

/// An immutable-by-convention script byte sequence.
///
/// Scripts compare and order as raw bytes, which is exactly the comparison
/// BIP-69 output ordering requires.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Script(Vec<u8>);

impl Script {
    /// Create an empty script.
    pub fn new() -> Self {
        Script(Vec::new())
    }

    /// Create a script from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Script(bytes.to_vec())
    }

    /// Parse a script from a hex string.
    pub fn from_hex(hex_str: &str) -> Result<Self, ScriptError> {
        Ok(Script(hex::decode(hex_str)?))
    }

    /// Hex-encode the script bytes.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Borrow the raw script bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Byte length of the script.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the script is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append data with the minimal push prefix.
    ///
    /// Direct push for 1-75 bytes, OP_PUSHDATA1 up to 255, OP_PUSHDATA2 up
    /// to 65535, OP_PUSHDATA4 beyond that.
    pub fn append_push_data(&mut self, data: &[u8]) -> Result<(), ScriptError> {
        let prefix = push_data_prefix(data.len())?;
        self.0.extend_from_slice(&prefix);
        self.0.extend_from_slice(data);
        Ok(())
    }

    /// Append raw opcodes.
    ///
    /// Rejects push-data opcodes; use `append_push_data` for those.
    pub fn append_opcodes(&mut self, opcodes: &[u8]) -> Result<(), ScriptError> {
        for &op in opcodes {
            if (OP_DATA_1..=OP_PUSHDATA4).contains(&op) {
                return Err(ScriptError::InvalidOpcodeType(op));
            }
        }
        self.0.extend_from_slice(opcodes);
        Ok(())
    }

    /// Parse the script into chunks.
    ///
    /// # Returns
    /// The chunk list, or `ScriptError::DataTooSmall` if a push runs past
    /// the end of the script.
    pub fn chunks(&self) -> Result<Vec<ScriptChunk>, ScriptError> {
        let b = &self.0;
        let mut chunks = Vec::new();
        let mut i = 0usize;
        while i < b.len() {
            let op = b[i];
            i += 1;
            let push_len = match op {
                OP_DATA_1..=OP_DATA_75 => op as usize,
                OP_PUSHDATA1 => {
                    let n = *b.get(i).ok_or(ScriptError::DataTooSmall)? as usize;
                    i += 1;
                    n
                }
                OP_PUSHDATA2 => {
                    if i + 2 > b.len() {
                        return Err(ScriptError::DataTooSmall);
                    }
                    let n = u16::from_le_bytes([b[i], b[i + 1]]) as usize;
                    i += 2;
                    n
                }
                OP_PUSHDATA4 => {
                    if i + 4 > b.len() {
                        return Err(ScriptError::DataTooSmall);
                    }
                    let n = u32::from_le_bytes([b[i], b[i + 1], b[i + 2], b[i + 3]]) as usize;
                    i += 4;
                    n
                }
                _ => {
                    chunks.push(ScriptChunk { op, data: None });
                    continue;
                }
            };
            if i + push_len > b.len() {
                return Err(ScriptError::DataTooSmall);
            }
            chunks.push(ScriptChunk {
                op,
                data: Some(b[i..i + push_len].to_vec()),
            });
            i += push_len;
        }
        Ok(chunks)
    }

    // -----------------------------------------------------------------
    // Classification
    // -----------------------------------------------------------------

    /// Pattern: OP_DUP OP_HASH160 <20 bytes> OP_EQUALVERIFY OP_CHECKSIG.
    pub fn is_p2pkh(&self) -> bool {
        let b = &self.0;
        b.len() == 25
            && b[0] == OP_DUP
            && b[1] == OP_HASH160
            && b[2] == OP_DATA_20
            && b[23] == OP_EQUALVERIFY
            && b[24] == OP_CHECKSIG
    }

    /// Pattern: OP_HASH160 <20 bytes> OP_EQUAL.
    pub fn is_p2sh(&self) -> bool {
        let b = &self.0;
        b.len() == 23 && b[0] == OP_HASH160 && b[1] == OP_DATA_20 && b[22] == OP_EQUAL
    }

    /// Pattern: <pubkey> OP_CHECKSIG with a 33- or 65-byte key.
    pub fn is_p2pk(&self) -> bool {
        let parts = match self.chunks() {
            Ok(p) => p,
            Err(_) => return false,
        };
        if parts.len() == 2 && parts[1].op == OP_CHECKSIG {
            if let Some(ref pubkey) = parts[0].data {
                return is_plausible_pubkey(pubkey);
            }
        }
        false
    }

    /// Pattern: OP_M <key1> ... <keyN> OP_N OP_CHECKMULTISIG.
    pub fn is_multisig_out(&self) -> bool {
        let parts = match self.chunks() {
            Ok(p) => p,
            Err(_) => return false,
        };
        if parts.len() < 4 {
            return false;
        }
        if !is_small_int_op(parts[0].op) {
            return false;
        }
        for chunk in &parts[1..parts.len() - 2] {
            match &chunk.data {
                Some(d) if !d.is_empty() => {}
                _ => return false,
            }
        }
        let second_last = &parts[parts.len() - 2];
        let last = &parts[parts.len() - 1];
        is_small_int_op(second_last.op) && last.op == OP_CHECKMULTISIG
    }

    /// Pattern: OP_0..OP_16 followed by a single 2-40 byte direct push.
    ///
    /// Matches native segwit outputs (P2WPKH, P2WSH, taproot), which the
    /// builder refuses to spend.
    pub fn is_witness_program(&self) -> bool {
        let b = &self.0;
        if b.len() < 4 || b.len() > 42 {
            return false;
        }
        if b[0] != OP_0 && !is_small_int_op(b[0]) {
            return false;
        }
        let push = b[1] as usize;
        (2..=40).contains(&push) && b.len() == 2 + push
    }

    /// Extract the 20-byte public key hash from a P2PKH script.
    pub fn public_key_hash(&self) -> Result<[u8; 20], ScriptError> {
        if !self.is_p2pkh() {
            return Err(ScriptError::NotP2pkh);
        }
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&self.0[3..23]);
        Ok(hash)
    }
}

impl std::fmt::Display for Script {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Compute the push prefix bytes for a payload of the given length.
pub fn push_data_prefix(data_len: usize) -> Result<Vec<u8>, ScriptError> {
    if data_len == 0 {
        Ok(vec![OP_0])
    } else if data_len <= OP_DATA_75 as usize {
        Ok(vec![data_len as u8])
    } else if data_len <= 0xff {
        Ok(vec![OP_PUSHDATA1, data_len as u8])
    } else if data_len <= 0xffff {
        let mut buf = vec![OP_PUSHDATA2];
        buf.extend_from_slice(&(data_len as u16).to_le_bytes());
        Ok(buf)
    } else if data_len <= 0xffff_ffff {
        let mut buf = vec![OP_PUSHDATA4];
        buf.extend_from_slice(&(data_len as u32).to_le_bytes());
        Ok(buf)
    } else {
        Err(ScriptError::DataTooBig)
    }
}

/// Whether `bytes` has the length and prefix of a SEC-encoded public key.
pub fn is_plausible_pubkey(bytes: &[u8]) -> bool {
    match bytes.first() {
        Some(0x02) | Some(0x03) => bytes.len() == 33,
        Some(0x04) | Some(0x06) | Some(0x07) => bytes.len() == 65,
        _ => false,
    }
}
