use crate::keyring::KeyId;

/// Error types for transaction construction and signing.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The chain identifier has no entry in the chain registry.
    #[error("unknown chain: {0}")]
    UnknownChain(String),

    /// A UTXO handed to the builder is structurally unusable.
    #[error("malformed utxo: {0}")]
    MalformedUtxo(String),

    /// A requested output form the builder does not know how to script.
    #[error("unsupported output type: {0}")]
    UnsupportedOutputType(String),

    /// More than one payment-code notification was requested.
    #[error("unsupported: {0} notification outputs requested, at most 1 allowed")]
    TooManyNotifications(usize),

    /// `add_change` was called twice on the same builder.
    #[error("a change key is already reserved for this build")]
    ChangeAlreadyReserved,

    /// The key service had no change key to reserve.
    #[error("no change key available")]
    ChangeKeysExhausted,

    /// Deriving the payment-code notification secret failed.
    #[error("notification key derivation failed: {0}")]
    NotificationDerivation(String),

    /// Input value does not cover outputs plus the required fee.
    #[error("not funded: {available} available, {required} required")]
    NotFunded {
        /// Accumulated input value.
        available: u64,
        /// Output value plus the current fee estimate.
        required: u64,
    },

    /// A builder method was called out of sequence.
    #[error("invalid builder state: expected {expected}, currently {actual}")]
    InvalidState {
        /// State the operation requires.
        expected: &'static str,
        /// State the builder is in.
        actual: &'static str,
    },

    /// The key service could not produce a signer for a key.
    #[error("key unavailable: {0}")]
    KeyUnavailable(KeyId),

    /// Signature generation failed.
    #[error("signing error: {0}")]
    SigningError(String),

    /// `add_signatures` received the wrong number of signature pairs.
    #[error("signature count mismatch: expected {expected}, got {got}")]
    SignatureCountMismatch {
        /// Signatures the spent script requires.
        expected: usize,
        /// Signatures supplied.
        got: usize,
    },

    /// The input spends a witness program; witness signing is not
    /// implemented and must never fall back to legacy serialization.
    #[error("segwit inputs are not supported")]
    SegwitUnsupported,

    /// Input index outside the transaction's input list.
    #[error("input index {index} out of range (tx has {count} inputs)")]
    InputIndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of inputs present.
        count: usize,
    },

    /// An error occurred during binary/hex serialization or deserialization.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// An underlying script error.
    #[error("script error: {0}")]
    Script(#[from] txkit_script::ScriptError),

    /// An underlying wire codec error.
    #[error("codec error: {0}")]
    Codec(#[from] txkit_codec::CodecError),
}
