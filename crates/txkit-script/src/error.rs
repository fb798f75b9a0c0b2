/// Error types for script operations.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// Generic invalid script error.
    #[error("invalid script: {0}")]
    InvalidScript(String),

    /// Attempted to append a push-data opcode through `append_opcodes`.
    #[error("use append_push_data for push data opcodes (0x{0:02x})")]
    InvalidOpcodeType(u8),

    /// Not enough data in the script to complete a push operation.
    #[error("not enough data")]
    DataTooSmall,

    /// Push data exceeds the maximum encodable size.
    #[error("data too big")]
    DataTooBig,

    /// Hex decoding error.
    #[error("hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),

    /// The script is not of the form required by the operation.
    #[error("not a P2PKH script")]
    NotP2pkh,

    /// A multisig script parameter is out of range.
    #[error("invalid multisig: {0}")]
    InvalidMultisig(String),

    /// A public key has an unrecognized length or prefix.
    #[error("invalid public key")]
    InvalidPublicKey,
}
