//! Opcode constants used by the script builders and classifiers.
//!
//! Only the opcodes the workspace actually emits or matches are defined;
//! this is not a full opcode table.

/// Push an empty byte vector.
pub const OP_0: u8 = 0x00;
/// Alias for OP_0.
pub const OP_FALSE: u8 = 0x00;
/// Smallest direct data push (1 byte follows).
pub const OP_DATA_1: u8 = 0x01;
/// Direct push of 20 bytes (hash160 payloads).
pub const OP_DATA_20: u8 = 0x14;
/// Direct push of 33 bytes (compressed public keys).
pub const OP_DATA_33: u8 = 0x21;
/// Largest direct data push (75 bytes follow).
pub const OP_DATA_75: u8 = 0x4b;
/// Next byte is the push length.
pub const OP_PUSHDATA1: u8 = 0x4c;
/// Next two bytes (LE) are the push length.
pub const OP_PUSHDATA2: u8 = 0x4d;
/// Next four bytes (LE) are the push length.
pub const OP_PUSHDATA4: u8 = 0x4e;
/// Push the number 1.
pub const OP_1: u8 = 0x51;
/// Push the number 16.
pub const OP_16: u8 = 0x60;
/// Terminate and mark output unspendable; remainder is data.
pub const OP_RETURN: u8 = 0x6a;
/// Duplicate the top stack item.
pub const OP_DUP: u8 = 0x76;
/// Test top two items for byte equality.
pub const OP_EQUAL: u8 = 0x87;
/// OP_EQUAL then fail the script if false.
pub const OP_EQUALVERIFY: u8 = 0x88;
/// Hash160 (sha256 then ripemd160) of the top item.
pub const OP_HASH160: u8 = 0xa9;
/// ECDSA signature check.
pub const OP_CHECKSIG: u8 = 0xac;
/// m-of-n ECDSA signature check.
pub const OP_CHECKMULTISIG: u8 = 0xae;

/// Map 1..=16 to the corresponding small-integer opcode.
pub fn small_int_op(n: usize) -> Option<u8> {
    if (1..=16).contains(&n) {
        Some(OP_1 + (n as u8 - 1))
    } else {
        None
    }
}

/// Whether `op` is one of OP_1..OP_16.
pub fn is_small_int_op(op: u8) -> bool {
    (OP_1..=OP_16).contains(&op)
}
