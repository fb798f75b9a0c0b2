//! The transaction construction state machine.
//!
//! A `TransactionBuilder` moves strictly forward through three states:
//!
//! ```text
//! Accumulating --finalize_outputs--> Finalized --sign_inputs--> Signed
//! ```
//!
//! While accumulating, inputs and outputs may be added freely and fee
//! arithmetic is re-evaluated on demand. Finalization assigns the change
//! value exactly once, drops a dust change output (releasing its reserved
//! key), and freezes the canonical input/output ordering. Signing never
//! reorders anything: every signature commits to the finalized ordering.
//! Calling a method out of sequence is an `InvalidState` error, not a
//! silent no-op.

use tracing::debug;
use txkit_codec::CompactSize;
use txkit_script::template::{lock_notification, lock_p2pkh};

use crate::chain::{params, ChainId, ChainParams, SighashStyle};
use crate::hashes::sha512_hmac;
use crate::input::TxInput;
use crate::keyring::{KeyId, KeyService, PassphraseContext, ProposalId};
use crate::outpoint::Utxo;
use crate::output::TxOutput;
use crate::preimage::{forkid_digest, legacy_digest, SighashCache, SigningView};
use crate::request::BuildRequest;
use crate::sighash::SigHash;
use crate::transaction::{Transaction, DEFAULT_VERSION};
use crate::BuildError;

/// Serialized size of a P2PKH change output, used to reserve fee room
/// before the change script exists.
const CHANGE_OUTPUT_SIZE: usize = 34;

/// Serialized size of a signed P2PKH input, the basis of the dust
/// threshold: an output smaller than the cost of spending it is dust.
const SPEND_INPUT_SIZE: u64 = 148;

/// Floor value for a payment-code notification output.
const NOTIFICATION_MIN_VALUE: u64 = 546;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuilderState {
    Accumulating,
    Finalized,
    Signed,
}

impl BuilderState {
    fn name(self) -> &'static str {
        match self {
            BuilderState::Accumulating => "accumulating",
            BuilderState::Finalized => "finalized",
            BuilderState::Signed => "signed",
        }
    }
}

/// Builds one transaction for one payment proposal.
///
/// The builder owns no keys and performs no cryptography itself; both
/// arrive through the `KeyService` collaborator at the call sites that
/// need them.
pub struct TransactionBuilder {
    chain: &'static ChainParams,
    fee_rate: u64,
    version: u32,
    lock_time: u32,
    inputs: Vec<TxInput>,
    outputs: Vec<TxOutput>,
    change_key: Option<KeyId>,
    state: BuilderState,
}

impl TransactionBuilder {
    /// Create a builder for the given chain.
    ///
    /// # Arguments
    /// * `chain`    - Target chain; must be present in the registry.
    /// * `fee_rate` - Fee rate in base units per 1000 bytes.
    pub fn new(chain: ChainId, fee_rate: u64) -> Result<Self, BuildError> {
        Ok(TransactionBuilder {
            chain: params(chain)?,
            fee_rate,
            version: DEFAULT_VERSION,
            lock_time: 0,
            inputs: Vec::new(),
            outputs: Vec::new(),
            change_key: None,
            state: BuilderState::Accumulating,
        })
    }

    fn require_state(&self, expected: BuilderState) -> Result<(), BuildError> {
        if self.state != expected {
            return Err(BuildError::InvalidState {
                expected: expected.name(),
                actual: self.state.name(),
            });
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // Accumulation
    // -----------------------------------------------------------------

    /// Add an input spending the given UTXO.
    pub fn add_input(&mut self, utxo: Utxo) -> Result<(), BuildError> {
        self.require_state(BuilderState::Accumulating)?;
        if utxo.script.is_empty() {
            return Err(BuildError::MalformedUtxo("empty locking script".to_string()));
        }
        if utxo.value == 0 {
            return Err(BuildError::MalformedUtxo("zero value".to_string()));
        }
        if utxo.script.is_witness_program() {
            return Err(BuildError::SegwitUnsupported);
        }
        debug!(outpoint = %utxo.outpoint, value = utxo.value, "adding input");
        let spends = TxOutput::new(utxo.value, utxo.script, utxo.key_ids.clone());
        self.inputs
            .push(TxInput::new(utxo.outpoint, spends, utxo.key_ids));
        Ok(())
    }

    /// Create the requested payment outputs.
    ///
    /// Notification requests are not handled here; they need the reserved
    /// change key and are materialized by `add_change`.
    pub fn create_outputs(&mut self, request: &BuildRequest) -> Result<(), BuildError> {
        self.require_state(BuilderState::Accumulating)?;
        for req in &request.outputs {
            let script = req.locking_script()?;
            let mut output = TxOutput::new(req.value(), script, Vec::new());
            if let Some(ref payee) = request.payee {
                output.set_payee(payee.clone());
            }
            self.outputs.push(output);
        }
        Ok(())
    }

    /// Reserve a change key and add the provisional change output, plus
    /// any payment-code notification outputs the request carries.
    ///
    /// The change output's value stays zero until `finalize_outputs`
    /// assigns the excess. At most one notification per transaction; the
    /// reserved change key doubles as the notification's local key.
    pub fn add_change(
        &mut self,
        request: &BuildRequest,
        keys: &dyn KeyService,
        proposal: &ProposalId,
    ) -> Result<(), BuildError> {
        self.require_state(BuilderState::Accumulating)?;
        if self.change_key.is_some() {
            return Err(BuildError::ChangeAlreadyReserved);
        }
        if request.notifications.len() > 1 {
            return Err(BuildError::TooManyNotifications(request.notifications.len()));
        }

        let key = keys
            .reserve_change_key(proposal)
            .ok_or(BuildError::ChangeKeysExhausted)?;
        let pkh = match keys.public_key_hash(&key) {
            Some(pkh) => pkh,
            None => {
                keys.release_change_key(proposal, &key);
                return Err(BuildError::KeyUnavailable(key));
            }
        };
        debug!(proposal = %proposal, key = %key, "reserved change key");

        if let Some(notification) = request.notifications.first() {
            match self.notification_output(&key, keys, notification) {
                Ok(output) => self.outputs.push(output),
                Err(e) => {
                    keys.release_change_key(proposal, &key);
                    return Err(e);
                }
            }
        }

        self.outputs
            .push(TxOutput::new_change(lock_p2pkh(&pkh), vec![key.clone()]));
        self.change_key = Some(key);
        Ok(())
    }

    /// Build the blinded 1-of-2 notification output for a remote payment
    /// code. The payload is the remote code's public portion, XOR-masked
    /// under the ECDH secret so only the two parties can recognize it.
    fn notification_output(
        &self,
        local_key: &KeyId,
        keys: &dyn KeyService,
        notification: &crate::request::NotificationRequest,
    ) -> Result<TxOutput, BuildError> {
        let remote = &notification.remote_code;
        let payload = remote.payload().ok_or_else(|| {
            BuildError::NotificationDerivation("payment code shorter than 33 bytes".to_string())
        })?;
        let secret = keys.notification_secret(local_key, remote).ok_or_else(|| {
            BuildError::NotificationDerivation("shared secret derivation failed".to_string())
        })?;
        let local_pubkey = keys
            .public_key(local_key)
            .ok_or_else(|| BuildError::KeyUnavailable(local_key.clone()))?;

        let mask = sha512_hmac(&secret, &remote.0);
        let mut blinded = [0u8; 33];
        blinded[0] = 0x02;
        for (i, byte) in payload[1..33].iter().enumerate() {
            blinded[1 + i] = byte ^ mask[i];
        }

        let script = lock_notification(&local_pubkey, &blinded)?;
        let value = self.dust().max(NOTIFICATION_MIN_VALUE);
        Ok(TxOutput::new(value, script, Vec::new()))
    }

    // -----------------------------------------------------------------
    // Fee arithmetic
    // -----------------------------------------------------------------

    /// Sum of all input values.
    pub fn input_value(&self) -> u64 {
        self.inputs.iter().filter_map(|i| i.value()).sum()
    }

    /// Sum of all output values (the provisional change output counts as
    /// zero until finalization).
    pub fn output_value(&self) -> u64 {
        self.outputs.iter().map(|o| o.value()).sum()
    }

    /// Estimated serialized size in bytes, always including room for a
    /// P2PKH change output whether or not one has been added yet.
    pub fn bytes(&self) -> usize {
        let mut n_out = self.outputs.len();
        let mut out_size: usize = self.outputs.iter().map(|o| o.calculate_size()).sum();
        if !self.outputs.iter().any(|o| o.is_change()) {
            n_out += 1;
            out_size += CHANGE_OUTPUT_SIZE;
        }
        8 + CompactSize::from(self.inputs.len()).size()
            + self.inputs.iter().map(|i| i.calculate_size()).sum::<usize>()
            + CompactSize::from(n_out).size()
            + out_size
    }

    /// Fee the current size demands at this builder's fee rate.
    /// Truncating division, same as node relay policy.
    pub fn required_fee(&self) -> u64 {
        self.bytes() as u64 * self.fee_rate / 1000
    }

    /// Threshold below which a change output costs more to spend than it
    /// is worth.
    pub fn dust(&self) -> u64 {
        SPEND_INPUT_SIZE * self.fee_rate / 1000
    }

    /// Whether accumulated inputs strictly cover outputs plus the fee.
    pub fn is_funded(&self) -> bool {
        self.input_value() > self.output_value() + self.required_fee()
    }

    // -----------------------------------------------------------------
    // Finalization and signing
    // -----------------------------------------------------------------

    /// Freeze the output set: assign the excess to the change output (or
    /// drop it as dust and release its key), then apply canonical BIP-69
    /// ordering to inputs and outputs and rewrite output indices.
    pub fn finalize_outputs(
        &mut self,
        keys: &dyn KeyService,
        proposal: &ProposalId,
    ) -> Result<(), BuildError> {
        self.require_state(BuilderState::Accumulating)?;

        let available = self.input_value();
        let required = self.output_value() + self.required_fee();
        if available <= required {
            return Err(BuildError::NotFunded {
                available,
                required,
            });
        }
        let excess = available - required;

        if let Some(pos) = self.outputs.iter().position(|o| o.is_change()) {
            if excess > self.dust() {
                self.outputs[pos].set_value(excess);
                debug!(change = excess, fee = self.required_fee(), "change assigned");
            } else {
                // Dust change goes to the miner instead; the reserved key
                // returns to the pool.
                let dropped = self.outputs.remove(pos);
                if let Some(key) = self.change_key.take() {
                    keys.release_change_key(proposal, &key);
                }
                debug!(dust = excess, script = %dropped.script(), "change dropped as dust");
            }
        }

        self.inputs
            .sort_by(|a, b| a.previous_output().cmp(b.previous_output()));
        self.outputs.sort_by(|a, b| a.bip69_key().cmp(&b.bip69_key()));
        for (i, output) in self.outputs.iter_mut().enumerate() {
            output.set_index(i as u32);
        }

        self.state = BuilderState::Finalized;
        Ok(())
    }

    /// Sign every input against the finalized ordering.
    ///
    /// Dispatches on the chain's sighash style. The fork-id hash caches
    /// live only for the duration of this call, so they can never leak
    /// into another builder or another input set.
    pub fn sign_inputs(
        &mut self,
        keys: &dyn KeyService,
        ctx: &PassphraseContext,
    ) -> Result<(), BuildError> {
        self.require_state(BuilderState::Finalized)?;

        let sighash = SigHash::for_chain(self.chain);
        let cache = SighashCache::new();

        for index in 0..self.inputs.len() {
            let spends_script = self.inputs[index]
                .spends()
                .map(|o| o.script().clone())
                .ok_or_else(|| {
                    BuildError::SigningError("missing previous output on input".to_string())
                })?;
            if spends_script.is_witness_program() {
                return Err(BuildError::SegwitUnsupported);
            }

            let digest = {
                let view = SigningView {
                    version: self.version,
                    inputs: &self.inputs,
                    outputs: &self.outputs,
                    lock_time: self.lock_time,
                };
                match self.chain.sighash_style {
                    SighashStyle::Legacy => legacy_digest(&view, index, &sighash)?,
                    SighashStyle::ForkId => forkid_digest(&view, &cache, index, &sighash)?,
                }
            };

            let mut pairs = Vec::with_capacity(self.inputs[index].keys().len());
            for key in self.inputs[index].keys().to_vec() {
                let signer = keys
                    .signer(&key, ctx)
                    .ok_or_else(|| BuildError::KeyUnavailable(key.clone()))?;
                let mut signature = signer.sign(&digest)?;
                signature.push(sighash.as_byte());
                pairs.push((signature, signer.public_key().to_vec()));
            }
            self.inputs[index].add_signatures(&pairs)?;
            debug!(index, "input signed");
        }

        self.state = BuilderState::Signed;
        Ok(())
    }

    /// Consume the builder and produce the immutable transaction.
    pub fn finalize_transaction(self) -> Result<Transaction, BuildError> {
        self.require_state(BuilderState::Signed)?;
        Ok(Transaction::new(
            self.version,
            self.inputs,
            self.outputs,
            self.lock_time,
        ))
    }

    // -----------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------

    /// The change key reserved by `add_change`, if still held.
    pub fn reserved_change_key(&self) -> Option<&KeyId> {
        self.change_key.as_ref()
    }

    /// The inputs accumulated so far.
    pub fn inputs(&self) -> &[TxInput] {
        &self.inputs
    }

    /// The outputs accumulated so far.
    pub fn outputs(&self) -> &[TxOutput] {
        &self.outputs
    }

    /// The chain this builder targets.
    pub fn chain(&self) -> ChainId {
        self.chain.chain
    }

    /// The fee rate in base units per 1000 bytes.
    pub fn fee_rate(&self) -> u64 {
        self.fee_rate
    }
}
