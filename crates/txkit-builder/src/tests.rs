//! End-to-end builder tests against an in-memory key service backed by
//! real secp256k1 keys, so produced signatures can be verified against
//! independently recomputed digests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};

use crate::builder::TransactionBuilder;
use crate::chain::{params, ChainId, SighashStyle};
use crate::hashes::hash160;
use crate::keyring::{
    InputSigner, KeyId, KeyService, PassphraseContext, PaymentCode, ProposalId,
};
use crate::outpoint::{Outpoint, Utxo};
use crate::preimage::{forkid_digest, legacy_digest, SighashCache, SigningView};
use crate::request::{BuildRequest, NotificationRequest, OutputRequest};
use crate::sighash::SigHash;
use crate::transaction::Transaction;
use crate::txid::TxId;
use crate::BuildError;
use txkit_script::template::lock_p2pkh;
use txkit_script::{opcodes, Script};

// ---------------------------------------------------------------------
// Test key service
// ---------------------------------------------------------------------

struct TestSigner {
    key: SigningKey,
}

impl InputSigner for TestSigner {
    fn public_key(&self) -> [u8; 33] {
        let point = self.key.verifying_key().to_encoded_point(true);
        let mut out = [0u8; 33];
        out.copy_from_slice(point.as_bytes());
        out
    }

    fn sign(&self, digest: &[u8; 32]) -> Result<Vec<u8>, BuildError> {
        let sig: Signature = self
            .key
            .sign_prehash(digest)
            .map_err(|e| BuildError::SigningError(e.to_string()))?;
        Ok(sig.to_der().as_bytes().to_vec())
    }
}

struct TestKeyService {
    keys: HashMap<KeyId, SigningKey>,
    change_pool: Mutex<Vec<KeyId>>,
    released: Mutex<Vec<KeyId>>,
}

impl TestKeyService {
    /// Keys "k1".."kN" for inputs plus "c1".."cM" in the change pool,
    /// each derived from a distinct fixed scalar.
    fn new(input_keys: usize, change_keys: usize) -> Self {
        let mut keys = HashMap::new();
        for i in 0..input_keys {
            let id = KeyId(format!("k{}", i + 1));
            keys.insert(id, fixed_key(10 + i as u8));
        }
        let mut pool = Vec::new();
        for i in 0..change_keys {
            let id = KeyId(format!("c{}", i + 1));
            keys.insert(id.clone(), fixed_key(100 + i as u8));
            pool.push(id);
        }
        TestKeyService {
            keys,
            change_pool: Mutex::new(pool),
            released: Mutex::new(Vec::new()),
        }
    }

    fn pubkey_hash_of(&self, id: &str) -> [u8; 20] {
        self.public_key_hash(&KeyId::from(id)).unwrap()
    }

    fn released_keys(&self) -> Vec<KeyId> {
        self.released.lock().unwrap().clone()
    }
}

fn fixed_key(fill: u8) -> SigningKey {
    SigningKey::from_slice(&[fill; 32]).unwrap()
}

impl KeyService for TestKeyService {
    fn reserve_change_key(&self, _proposal: &ProposalId) -> Option<KeyId> {
        self.change_pool.lock().unwrap().pop()
    }

    fn release_change_key(&self, _proposal: &ProposalId, key: &KeyId) {
        let mut released = self.released.lock().unwrap();
        if !released.contains(key) {
            released.push(key.clone());
            self.change_pool.lock().unwrap().push(key.clone());
        }
    }

    fn signer(&self, key: &KeyId, _ctx: &PassphraseContext) -> Option<Arc<dyn InputSigner>> {
        let key = self.keys.get(key)?.clone();
        Some(Arc::new(TestSigner { key }))
    }

    fn public_key(&self, key: &KeyId) -> Option<[u8; 33]> {
        let signing_key = self.keys.get(key)?;
        let point = signing_key.verifying_key().to_encoded_point(true);
        let mut out = [0u8; 33];
        out.copy_from_slice(point.as_bytes());
        Some(out)
    }

    fn public_key_hash(&self, key: &KeyId) -> Option<[u8; 20]> {
        self.public_key(key).map(|pk| hash160(&pk))
    }

    fn notification_secret(&self, _key: &KeyId, _remote: &PaymentCode) -> Option<[u8; 32]> {
        Some([0x5a; 32])
    }
}

// ---------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------

fn utxo_for(service: &TestKeyService, key: &str, txid_fill: u8, vout: u32, value: u64) -> Utxo {
    Utxo::new(
        Outpoint::new(TxId::new([txid_fill; 32]), vout),
        value,
        lock_p2pkh(&service.pubkey_hash_of(key)),
        vec![KeyId::from(key)],
    )
}

fn simple_request(value: u64) -> BuildRequest {
    BuildRequest {
        outputs: vec![OutputRequest::PubkeyHash {
            value,
            pubkey_hash: [0xee; 20],
        }],
        notifications: Vec::new(),
        fee_rate: 10_000,
        payee: Some("bob".to_string()),
    }
}

/// Recompute every input's digest from the final transaction and verify
/// its DER signature against the pubkey embedded in the unlock script.
fn verify_signatures(tx: &Transaction, chain: ChainId) {
    let chain_params = params(chain).unwrap();
    let sighash = SigHash::for_chain(chain_params);
    let cache = SighashCache::new();
    let view = SigningView {
        version: tx.version(),
        inputs: tx.inputs(),
        outputs: tx.outputs(),
        lock_time: tx.lock_time(),
    };
    for (i, input) in tx.inputs().iter().enumerate() {
        let digest = match chain_params.sighash_style {
            SighashStyle::Legacy => legacy_digest(&view, i, &sighash).unwrap(),
            SighashStyle::ForkId => forkid_digest(&view, &cache, i, &sighash).unwrap(),
        };
        let unlock = input.unlock_script().unwrap();
        let chunks = unlock.chunks().unwrap();
        let sig_with_byte = chunks[0].data.as_ref().unwrap();
        let pubkey = chunks[1].data.as_ref().unwrap();
        assert_eq!(*sig_with_byte.last().unwrap(), sighash.as_byte());

        let verifying_key = VerifyingKey::from_sec1_bytes(pubkey).unwrap();
        let signature = Signature::from_der(&sig_with_byte[..sig_with_byte.len() - 1]).unwrap();
        verifying_key.verify_prehash(&digest, &signature).unwrap();
    }
}

fn build_simple(
    chain: ChainId,
    service: &TestKeyService,
    input_value: u64,
    output_value: u64,
) -> Result<(TransactionBuilder, ProposalId), BuildError> {
    let proposal = ProposalId::from("p1");
    let request = simple_request(output_value);
    let mut builder = TransactionBuilder::new(chain, request.fee_rate)?;
    builder.add_input(utxo_for(service, "k1", 0xaa, 0, input_value))?;
    builder.create_outputs(&request)?;
    builder.add_change(&request, service, &proposal)?;
    Ok((builder, proposal))
}

// ---------------------------------------------------------------------
// Fee arithmetic
// ---------------------------------------------------------------------

#[test]
fn size_and_fee_estimate_single_p2pkh() {
    let service = TestKeyService::new(1, 1);
    let (builder, _) = build_simple(ChainId::Bitcoin, &service, 50_000, 30_000).unwrap();
    // 8 overhead + 1 input count + 149 input + 1 output count
    // + 34 payment output + 34 change output
    assert_eq!(builder.bytes(), 227);
    assert_eq!(builder.required_fee(), 2_270);
    assert_eq!(builder.dust(), 1_480);
    assert!(builder.is_funded());
}

#[test]
fn size_reserves_change_room_before_add_change() {
    let service = TestKeyService::new(1, 1);
    let request = simple_request(30_000);
    let mut builder = TransactionBuilder::new(ChainId::Bitcoin, request.fee_rate).unwrap();
    builder
        .add_input(utxo_for(&service, "k1", 0xaa, 0, 50_000))
        .unwrap();
    builder.create_outputs(&request).unwrap();
    // Same estimate whether or not the change output exists yet.
    assert_eq!(builder.bytes(), 227);
}

#[test]
fn not_funded_when_inputs_exactly_cover() {
    let service = TestKeyService::new(1, 1);
    // Equality is not enough; funding must be strict.
    let (mut builder, proposal) =
        build_simple(ChainId::Bitcoin, &service, 32_270, 30_000).unwrap();
    assert!(!builder.is_funded());
    let err = builder.finalize_outputs(&service, &proposal).unwrap_err();
    assert!(matches!(
        err,
        BuildError::NotFunded {
            available: 32_270,
            required: 32_270,
        }
    ));
}

// ---------------------------------------------------------------------
// Full builds
// ---------------------------------------------------------------------

#[test]
fn forkid_build_produces_verifiable_signatures() {
    let service = TestKeyService::new(1, 1);
    let (mut builder, proposal) =
        build_simple(ChainId::BitcoinCash, &service, 50_000, 30_000).unwrap();
    builder.finalize_outputs(&service, &proposal).unwrap();

    // Excess after the 2270 fee goes to change.
    let change = builder
        .outputs()
        .iter()
        .find(|o| o.is_change())
        .unwrap();
    assert_eq!(change.value(), 17_730);

    builder
        .sign_inputs(&service, &PassphraseContext::default())
        .unwrap();
    let tx = builder.finalize_transaction().unwrap();
    assert_eq!(tx.total_output_value(), 47_730);
    verify_signatures(&tx, ChainId::BitcoinCash);

    // The signed transaction parses back from its own wire bytes.
    let parsed = Transaction::from_bytes(&tx.to_bytes()).unwrap();
    assert_eq!(parsed.txid(), tx.txid());
    assert_eq!(parsed.to_bytes(), tx.to_bytes());
}

#[test]
fn legacy_build_produces_verifiable_signatures() {
    let service = TestKeyService::new(2, 1);
    let proposal = ProposalId::from("p-legacy");
    let request = simple_request(60_000);
    let mut builder = TransactionBuilder::new(ChainId::Bitcoin, request.fee_rate).unwrap();
    builder
        .add_input(utxo_for(&service, "k1", 0xbb, 0, 40_000))
        .unwrap();
    builder
        .add_input(utxo_for(&service, "k2", 0xcc, 1, 40_000))
        .unwrap();
    builder.create_outputs(&request).unwrap();
    builder.add_change(&request, &service, &proposal).unwrap();
    builder.finalize_outputs(&service, &proposal).unwrap();
    builder
        .sign_inputs(&service, &PassphraseContext::default())
        .unwrap();
    let tx = builder.finalize_transaction().unwrap();
    assert_eq!(tx.inputs().len(), 2);
    verify_signatures(&tx, ChainId::Bitcoin);
}

#[test]
fn dust_change_is_dropped_and_key_released() {
    let service = TestKeyService::new(1, 1);
    // Excess of 980 is below the 1480 dust threshold.
    let (mut builder, proposal) =
        build_simple(ChainId::Bitcoin, &service, 33_250, 30_000).unwrap();
    let reserved = builder.reserved_change_key().unwrap().clone();
    builder.finalize_outputs(&service, &proposal).unwrap();

    assert!(builder.reserved_change_key().is_none());
    assert_eq!(builder.outputs().len(), 1);
    assert_eq!(service.released_keys(), vec![reserved]);

    builder
        .sign_inputs(&service, &PassphraseContext::default())
        .unwrap();
    let tx = builder.finalize_transaction().unwrap();
    assert_eq!(tx.outputs().len(), 1);
    verify_signatures(&tx, ChainId::Bitcoin);
}

// ---------------------------------------------------------------------
// Canonical ordering
// ---------------------------------------------------------------------

#[test]
fn bip69_orders_inputs_and_outputs() {
    let service = TestKeyService::new(3, 1);
    let proposal = ProposalId::from("p-order");
    let request = BuildRequest {
        outputs: vec![
            OutputRequest::PubkeyHash {
                value: 70_000,
                pubkey_hash: [0xff; 20],
            },
            OutputRequest::PubkeyHash {
                value: 5_000,
                pubkey_hash: [0x01; 20],
            },
            // Same value as the previous output; script bytes break the tie.
            OutputRequest::PubkeyHash {
                value: 5_000,
                pubkey_hash: [0x00; 20],
            },
        ],
        notifications: Vec::new(),
        fee_rate: 10_000,
        payee: None,
    };
    let mut builder = TransactionBuilder::new(ChainId::Bitcoin, request.fee_rate).unwrap();
    // Added in descending display-txid order; must come out ascending.
    builder
        .add_input(utxo_for(&service, "k1", 0x03, 0, 40_000))
        .unwrap();
    builder
        .add_input(utxo_for(&service, "k2", 0x01, 7, 40_000))
        .unwrap();
    builder
        .add_input(utxo_for(&service, "k3", 0x02, 2, 40_000))
        .unwrap();
    builder.create_outputs(&request).unwrap();
    builder.add_change(&request, &service, &proposal).unwrap();
    builder.finalize_outputs(&service, &proposal).unwrap();

    let prevouts: Vec<_> = builder
        .inputs()
        .iter()
        .map(|i| *i.previous_output())
        .collect();
    let mut sorted = prevouts.clone();
    sorted.sort();
    assert_eq!(prevouts, sorted);

    let outputs = builder.outputs();
    for pair in outputs.windows(2) {
        assert!(pair[0].bip69_key() <= pair[1].bip69_key());
    }
    for (i, output) in outputs.iter().enumerate() {
        assert_eq!(output.index(), i as u32);
    }
    // Tie on value resolved by script bytes.
    assert_eq!(outputs[0].value(), 5_000);
    assert_eq!(outputs[1].value(), 5_000);
    assert!(outputs[0].script().as_bytes() < outputs[1].script().as_bytes());
}

#[test]
fn signing_commits_to_finalized_order() {
    // Two builds of the same payment from the same UTXOs must produce
    // the same txid: ordering is canonical, not insertion-dependent.
    let build = |flip: bool| {
        let service = TestKeyService::new(2, 1);
        let proposal = ProposalId::from("p-det");
        let request = simple_request(60_000);
        let mut builder = TransactionBuilder::new(ChainId::Bitcoin, request.fee_rate).unwrap();
        let a = utxo_for(&service, "k1", 0x11, 0, 40_000);
        let b = utxo_for(&service, "k2", 0x22, 0, 40_000);
        let (first, second) = if flip { (b, a) } else { (a, b) };
        builder.add_input(first).unwrap();
        builder.add_input(second).unwrap();
        builder.create_outputs(&request).unwrap();
        builder.add_change(&request, &service, &proposal).unwrap();
        builder.finalize_outputs(&service, &proposal).unwrap();
        builder
            .sign_inputs(&service, &PassphraseContext::default())
            .unwrap();
        builder.finalize_transaction().unwrap().txid()
    };
    assert_eq!(build(false), build(true));
}

// ---------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------

#[test]
fn methods_reject_out_of_sequence_calls() {
    let service = TestKeyService::new(1, 1);
    let (mut builder, proposal) =
        build_simple(ChainId::Bitcoin, &service, 50_000, 30_000).unwrap();

    // Signing before finalization is refused.
    let err = builder
        .sign_inputs(&service, &PassphraseContext::default())
        .unwrap_err();
    assert!(matches!(err, BuildError::InvalidState { .. }));

    builder.finalize_outputs(&service, &proposal).unwrap();

    // No more accumulation after finalization.
    let err = builder
        .add_input(utxo_for(&service, "k1", 0x07, 0, 1_000))
        .unwrap_err();
    assert!(matches!(err, BuildError::InvalidState { .. }));
    let err = builder
        .finalize_outputs(&service, &proposal)
        .unwrap_err();
    assert!(matches!(err, BuildError::InvalidState { .. }));

    // The transaction only exists after signing.
    let err = builder.finalize_transaction().unwrap_err();
    assert!(matches!(err, BuildError::InvalidState { .. }));
}

#[test]
fn change_cannot_be_reserved_twice() {
    let service = TestKeyService::new(1, 2);
    let proposal = ProposalId::from("p-twice");
    let request = simple_request(30_000);
    let mut builder = TransactionBuilder::new(ChainId::Bitcoin, request.fee_rate).unwrap();
    builder
        .add_input(utxo_for(&service, "k1", 0xaa, 0, 50_000))
        .unwrap();
    builder.create_outputs(&request).unwrap();
    builder.add_change(&request, &service, &proposal).unwrap();
    let err = builder
        .add_change(&request, &service, &proposal)
        .unwrap_err();
    assert!(matches!(err, BuildError::ChangeAlreadyReserved));
}

#[test]
fn change_pool_exhaustion() {
    let service = TestKeyService::new(1, 0);
    let proposal = ProposalId::from("p-empty");
    let request = simple_request(30_000);
    let mut builder = TransactionBuilder::new(ChainId::Bitcoin, request.fee_rate).unwrap();
    let err = builder
        .add_change(&request, &service, &proposal)
        .unwrap_err();
    assert!(matches!(err, BuildError::ChangeKeysExhausted));
}

// ---------------------------------------------------------------------
// Input validation
// ---------------------------------------------------------------------

#[test]
fn witness_program_utxo_rejected() {
    let mut builder = TransactionBuilder::new(ChainId::Bitcoin, 10_000).unwrap();
    let mut bytes = vec![opcodes::OP_0, 0x14];
    bytes.extend_from_slice(&[0x42; 20]);
    let utxo = Utxo::new(
        Outpoint::new(TxId::new([1; 32]), 0),
        10_000,
        Script::from_bytes(&bytes),
        vec![KeyId::from("k1")],
    );
    assert!(matches!(
        builder.add_input(utxo),
        Err(BuildError::SegwitUnsupported)
    ));
}

#[test]
fn malformed_utxos_rejected() {
    let service = TestKeyService::new(1, 1);
    let mut builder = TransactionBuilder::new(ChainId::Bitcoin, 10_000).unwrap();

    let empty_script = Utxo::new(
        Outpoint::new(TxId::new([1; 32]), 0),
        10_000,
        Script::new(),
        vec![KeyId::from("k1")],
    );
    assert!(matches!(
        builder.add_input(empty_script),
        Err(BuildError::MalformedUtxo(_))
    ));

    let zero_value = Utxo::new(
        Outpoint::new(TxId::new([1; 32]), 0),
        0,
        lock_p2pkh(&service.pubkey_hash_of("k1")),
        vec![KeyId::from("k1")],
    );
    assert!(matches!(
        builder.add_input(zero_value),
        Err(BuildError::MalformedUtxo(_))
    ));
}

// ---------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------

fn notification_request(value: u64, copies: usize) -> BuildRequest {
    // An 80-byte code whose last 33 bytes form the public payload.
    let mut code = vec![0u8; 80];
    code[47] = 0x02;
    for (i, byte) in code[48..].iter_mut().enumerate() {
        *byte = i as u8 + 1;
    }
    BuildRequest {
        outputs: vec![OutputRequest::PubkeyHash {
            value,
            pubkey_hash: [0xee; 20],
        }],
        notifications: vec![
            NotificationRequest {
                remote_code: PaymentCode(code),
            };
            copies
        ],
        fee_rate: 10_000,
        payee: None,
    }
}

#[test]
fn notification_output_is_blinded_multisig() {
    let service = TestKeyService::new(1, 1);
    let proposal = ProposalId::from("p-notify");
    let request = notification_request(30_000, 1);
    let mut builder = TransactionBuilder::new(ChainId::Bitcoin, request.fee_rate).unwrap();
    builder
        .add_input(utxo_for(&service, "k1", 0xaa, 0, 100_000))
        .unwrap();
    builder.create_outputs(&request).unwrap();
    builder.add_change(&request, &service, &proposal).unwrap();

    let notification = builder
        .outputs()
        .iter()
        .find(|o| o.script().is_multisig_out())
        .unwrap();
    // Carries at least the dust threshold.
    assert!(notification.value() >= builder.dust());
    let chunks = notification.script().chunks().unwrap();
    // OP_1 <local key> <blinded payload> OP_2 OP_CHECKMULTISIG
    assert_eq!(chunks.len(), 5);
    assert_eq!(chunks[0].op, opcodes::OP_1);
    let local = chunks[1].data.as_ref().unwrap();
    assert_eq!(
        local.as_slice(),
        &service.public_key(&KeyId::from("c1")).unwrap()
    );
    let blinded = chunks[2].data.as_ref().unwrap();
    assert_eq!(blinded.len(), 33);
    assert_eq!(blinded[0], 0x02);
    // Masked, so not the raw remote payload.
    let raw_payload = &request.notifications[0].remote_code.0[47..];
    assert_ne!(blinded.as_slice(), raw_payload);

    builder.finalize_outputs(&service, &proposal).unwrap();
    builder
        .sign_inputs(&service, &PassphraseContext::default())
        .unwrap();
    let tx = builder.finalize_transaction().unwrap();
    assert_eq!(tx.outputs().len(), 3);
    verify_signatures(&tx, ChainId::Bitcoin);
}

#[test]
fn at_most_one_notification() {
    let service = TestKeyService::new(1, 1);
    let proposal = ProposalId::from("p-many");
    let request = notification_request(30_000, 2);
    let mut builder = TransactionBuilder::new(ChainId::Bitcoin, request.fee_rate).unwrap();
    builder
        .add_input(utxo_for(&service, "k1", 0xaa, 0, 100_000))
        .unwrap();
    builder.create_outputs(&request).unwrap();
    let err = builder
        .add_change(&request, &service, &proposal)
        .unwrap_err();
    assert!(matches!(err, BuildError::TooManyNotifications(2)));
}

#[test]
fn short_payment_code_fails_derivation_and_releases_key() {
    let service = TestKeyService::new(1, 1);
    let proposal = ProposalId::from("p-short");
    let request = BuildRequest {
        outputs: vec![OutputRequest::PubkeyHash {
            value: 10_000,
            pubkey_hash: [0xee; 20],
        }],
        notifications: vec![NotificationRequest {
            remote_code: PaymentCode(vec![1; 10]),
        }],
        fee_rate: 10_000,
        payee: None,
    };
    let mut builder = TransactionBuilder::new(ChainId::Bitcoin, request.fee_rate).unwrap();
    builder
        .add_input(utxo_for(&service, "k1", 0xaa, 0, 100_000))
        .unwrap();
    builder.create_outputs(&request).unwrap();
    let err = builder
        .add_change(&request, &service, &proposal)
        .unwrap_err();
    assert!(matches!(err, BuildError::NotificationDerivation(_)));
    // The reserved key went back to the pool.
    assert_eq!(service.released_keys().len(), 1);
    assert!(builder.reserved_change_key().is_none());
}
