//! Constructors for the standard locking and unlocking script forms.
//!
//! The transaction builder emits four spendable output forms (P2PKH, P2SH,
//! raw pubkey, bare multisig) plus the 1-of-2 bare-multisig payment-code
//! notification form. Anything else is rejected upstream.

use crate::opcodes::*;
use crate::script::is_plausible_pubkey;
use crate::{Script, ScriptError};

/// Build a P2PKH locking script.
///
/// Produces: `OP_DUP OP_HASH160 <20-byte hash> OP_EQUALVERIFY OP_CHECKSIG`
pub fn lock_p2pkh(pubkey_hash: &[u8; 20]) -> Script {
    let mut bytes = Vec::with_capacity(25);
    bytes.push(OP_DUP);
    bytes.push(OP_HASH160);
    bytes.push(OP_DATA_20);
    bytes.extend_from_slice(pubkey_hash);
    bytes.push(OP_EQUALVERIFY);
    bytes.push(OP_CHECKSIG);
    Script::from_bytes(&bytes)
}

/// Build a P2SH locking script.
///
/// Produces: `OP_HASH160 <20-byte script hash> OP_EQUAL`
pub fn lock_p2sh(script_hash: &[u8; 20]) -> Script {
    let mut bytes = Vec::with_capacity(23);
    bytes.push(OP_HASH160);
    bytes.push(OP_DATA_20);
    bytes.extend_from_slice(script_hash);
    bytes.push(OP_EQUAL);
    Script::from_bytes(&bytes)
}

/// Build a raw pay-to-pubkey locking script.
///
/// Produces: `<pubkey> OP_CHECKSIG`
pub fn lock_p2pk(pubkey: &[u8]) -> Result<Script, ScriptError> {
    if !is_plausible_pubkey(pubkey) {
        return Err(ScriptError::InvalidPublicKey);
    }
    let mut script = Script::new();
    script.append_push_data(pubkey)?;
    script.append_opcodes(&[OP_CHECKSIG])?;
    Ok(script)
}

/// Build a bare m-of-n multisig locking script.
///
/// Produces: `OP_M <key1> ... <keyN> OP_N OP_CHECKMULTISIG`
///
/// # Arguments
/// * `required` - Number of signatures required (m).
/// * `pubkeys`  - The public keys (n), each SEC-encoded.
pub fn lock_multisig(required: usize, pubkeys: &[&[u8]]) -> Result<Script, ScriptError> {
    let n = pubkeys.len();
    if n == 0 || n > 16 {
        return Err(ScriptError::InvalidMultisig(format!(
            "key count {} out of range 1..=16",
            n
        )));
    }
    if required == 0 || required > n {
        return Err(ScriptError::InvalidMultisig(format!(
            "required {} out of range 1..={}",
            required, n
        )));
    }
    for key in pubkeys {
        if !is_plausible_pubkey(key) {
            return Err(ScriptError::InvalidPublicKey);
        }
    }
    let m_op = small_int_op(required)
        .ok_or_else(|| ScriptError::InvalidMultisig(format!("bad required count {}", required)))?;
    let n_op = small_int_op(n)
        .ok_or_else(|| ScriptError::InvalidMultisig(format!("bad key count {}", n)))?;
    let mut script = Script::new();
    script.append_opcodes(&[m_op])?;
    for key in pubkeys {
        script.append_push_data(key)?;
    }
    script.append_opcodes(&[n_op, OP_CHECKMULTISIG])?;
    Ok(script)
}

/// Build a payment-code notification locking script.
///
/// A 1-of-2 bare multisig whose second "key" slot carries the blinded
/// payment-code payload. The payload must be shaped like a compressed
/// public key (33 bytes, 0x02/0x03 prefix) so the script remains a
/// standard multisig output on the wire.
pub fn lock_notification(
    local_pubkey: &[u8],
    blinded_payload: &[u8],
) -> Result<Script, ScriptError> {
    if blinded_payload.len() != 33 {
        return Err(ScriptError::InvalidMultisig(format!(
            "notification payload must be 33 bytes, got {}",
            blinded_payload.len()
        )));
    }
    lock_multisig(1, &[local_pubkey, blinded_payload])
}

/// Build a P2PKH unlocking script: `<sig||sighash_byte> <pubkey>`.
///
/// # Arguments
/// * `signature` - DER signature with the sighash byte already appended.
/// * `pubkey`    - The SEC-encoded public key.
pub fn unlock_p2pkh(signature: &[u8], pubkey: &[u8]) -> Result<Script, ScriptError> {
    let mut script = Script::new();
    script.append_push_data(signature)?;
    script.append_push_data(pubkey)?;
    Ok(script)
}

/// Build a bare-multisig unlocking script: `OP_0 <sig1> ... <sigM>`.
///
/// The leading OP_0 absorbs the off-by-one in OP_CHECKMULTISIG.
pub fn unlock_multisig(signatures: &[&[u8]]) -> Result<Script, ScriptError> {
    let mut script = Script::new();
    script.append_opcodes(&[OP_0])?;
    for sig in signatures {
        script.append_push_data(sig)?;
    }
    Ok(script)
}
