//! Hash primitives used by transaction identification and signing.

use hmac::{Hmac, Mac};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256, Sha512};

/// SHA-256 of the input data.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Double SHA-256, the standard transaction-id and sighash digest.
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// Hash160: RIPEMD-160(SHA-256(data)), used for public key hashes.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let mut hasher = Ripemd160::new();
    hasher.update(sha256(data));
    let result = hasher.finalize();
    let mut output = [0u8; 20];
    output.copy_from_slice(&result);
    output
}

/// HMAC-SHA512, used to derive the payment-code notification mask.
pub fn sha512_hmac(key: &[u8], msg: &[u8]) -> [u8; 64] {
    let mut mac =
        Hmac::<Sha512>::new_from_slice(key).expect("hmac accepts any key length");
    mac.update(msg);
    let result = mac.finalize().into_bytes();
    let mut output = [0u8; 64];
    output.copy_from_slice(&result);
    output
}
