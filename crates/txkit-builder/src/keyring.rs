//! Collaborator seam for key management.
//!
//! The builder never holds private keys or implements ECDSA. All key
//! material lives behind the `KeyService` trait: change-key reservation
//! against the wallet database, signer lookup by key identifier, and the
//! ECDH secret backing payment-code notification outputs.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::BuildError;

/// Opaque identifier of a key held by the key-management collaborator.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KeyId(pub String);

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for KeyId {
    fn from(s: &str) -> Self {
        KeyId(s.to_string())
    }
}

/// Caller-assigned identifier of one payment proposal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProposalId(pub String);

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ProposalId {
    fn from(s: &str) -> Self {
        ProposalId(s.to_string())
    }
}

/// Password context forwarded to the key service when unlocking private
/// keys. Opaque to the builder.
#[derive(Debug, Clone, Default)]
pub struct PassphraseContext(pub Option<String>);

/// A serialized payment code used for stealth-address notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCode(pub Vec<u8>);

impl PaymentCode {
    /// The public payload portion of the code: the bytes that get blinded
    /// into the notification output. Requires at least 33 bytes.
    pub fn payload(&self) -> Option<&[u8]> {
        if self.0.len() < 33 {
            return None;
        }
        Some(&self.0[self.0.len() - 33..])
    }
}

/// A signer for one key, produced by the key service.
///
/// Implementations wrap whatever cryptographic backend the platform
/// injects; the builder only ever sees digests in and DER signatures out.
pub trait InputSigner: Send + Sync {
    /// The 33-byte compressed public key.
    fn public_key(&self) -> [u8; 33];

    /// Sign a 32-byte digest, returning a DER-encoded ECDSA signature
    /// (without any sighash byte).
    fn sign(&self, digest: &[u8; 32]) -> Result<Vec<u8>, BuildError>;
}

/// The key-management collaborator.
///
/// Reservation is exclusive and at-most-once per proposal; release is
/// idempotent. Reservation failure is permanent for one build attempt.
pub trait KeyService: Send + Sync {
    /// Exclusively allocate a change key for a proposal. `None` signals
    /// exhaustion.
    fn reserve_change_key(&self, proposal: &ProposalId) -> Option<KeyId>;

    /// Release a previously reserved change key. Idempotent.
    fn release_change_key(&self, proposal: &ProposalId, key: &KeyId);

    /// Produce a signer for a key, unlocking it with the given password
    /// context. `None` if the key cannot be obtained.
    fn signer(&self, key: &KeyId, ctx: &PassphraseContext) -> Option<Arc<dyn InputSigner>>;

    /// The 33-byte compressed public key for a key. Unlike `signer`, this
    /// needs no password context.
    fn public_key(&self, key: &KeyId) -> Option<[u8; 33]>;

    /// The hash160 of a key's public key.
    fn public_key_hash(&self, key: &KeyId) -> Option<[u8; 20]>;

    /// ECDH shared secret between a local key and a remote payment code,
    /// used to blind the notification payload. `None` if derivation fails.
    fn notification_secret(&self, key: &KeyId, remote: &PaymentCode) -> Option<[u8; 32]>;
}
