//! The proposal queue and its processing loop.
//!
//! `ProposalManager::run` is one tick of the lifecycle: expire stale
//! proposals, attempt to build and broadcast the rest, and rebroadcast
//! anything still waiting for chain confirmation. The surrounding
//! application drives the ticks (timer, event loop, or test harness) and
//! reports confirmations back via `confirmed`.
//!
//! Failure handling distinguishes two classes. Temporary conditions
//! (insufficient funds, change-key exhaustion, network trouble) keep the
//! proposal queued for the next tick with every reservation released.
//! Permanent conditions resolve the caller's completion channel with the
//! error and drop the proposal.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use tracing::{debug, warn};

use txkit_builder::{
    BuildError, KeyService, PassphraseContext, ProposalId, Transaction, TransactionBuilder, TxId,
};

use crate::proposal::Proposal;
use crate::source::{BroadcastFailure, Broadcaster, UtxoSource};
use crate::ProposalError;

/// Completion side of one proposal's promise.
type Responder = oneshot::Sender<Result<TxId, ProposalError>>;

/// Tuning knobs for the proposal lifecycle.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// How long a proposal may stay queued before it fails as expired.
    pub expiry: Duration,
    /// How often an unconfirmed transaction is resubmitted.
    pub rebroadcast_interval: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        ManagerConfig {
            expiry: Duration::from_secs(60 * 60),
            rebroadcast_interval: Duration::from_secs(10 * 60),
        }
    }
}

struct PendingEntry {
    proposal: Proposal,
    queued_at: Instant,
    responder: Responder,
}

struct ConfirmingEntry {
    tx: Transaction,
    last_broadcast: Instant,
}

enum AttemptOutcome {
    Built(Transaction),
    Retry,
    Failed(ProposalError),
}

/// Owns the queue of open payment proposals.
pub struct ProposalManager {
    config: ManagerConfig,
    keys: std::sync::Arc<dyn KeyService>,
    utxos: std::sync::Arc<dyn UtxoSource>,
    broadcaster: std::sync::Arc<dyn Broadcaster>,
    pending: Mutex<HashMap<ProposalId, PendingEntry>>,
    confirming: Mutex<HashMap<TxId, ConfirmingEntry>>,
}

impl ProposalManager {
    /// Create a manager over the injected collaborators.
    pub fn new(
        config: ManagerConfig,
        keys: std::sync::Arc<dyn KeyService>,
        utxos: std::sync::Arc<dyn UtxoSource>,
        broadcaster: std::sync::Arc<dyn Broadcaster>,
    ) -> Self {
        ProposalManager {
            config,
            keys,
            utxos,
            broadcaster,
            pending: Mutex::new(HashMap::new()),
            confirming: Mutex::new(HashMap::new()),
        }
    }

    /// Queue a proposal.
    ///
    /// # Returns
    /// A one-shot receiver resolving to the broadcast txid or the reason
    /// the proposal failed. Duplicate identifiers are refused.
    pub fn add(
        &self,
        proposal: Proposal,
    ) -> Result<oneshot::Receiver<Result<TxId, ProposalError>>, ProposalError> {
        let mut pending = self.pending.lock().map_err(poisoned)?;
        if pending.contains_key(&proposal.id) {
            return Err(ProposalError::Duplicate(proposal.id));
        }
        let (responder, receiver) = oneshot::channel();
        debug!(proposal = %proposal.id, "proposal queued");
        pending.insert(
            proposal.id.clone(),
            PendingEntry {
                proposal,
                queued_at: Instant::now(),
                responder,
            },
        );
        Ok(receiver)
    }

    /// Number of proposals still waiting to be built.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// Report that a transaction reached the chain; stops rebroadcasting.
    ///
    /// # Returns
    /// Whether the txid was being tracked.
    pub fn confirmed(&self, txid: &TxId) -> bool {
        match self.confirming.lock() {
            Ok(mut confirming) => confirming.remove(txid).is_some(),
            Err(_) => false,
        }
    }

    /// One lifecycle tick.
    ///
    /// # Returns
    /// Whether any work remains (queued proposals or unconfirmed
    /// transactions), so the caller knows to keep scheduling ticks.
    pub fn run(&self, ctx: &PassphraseContext) -> bool {
        // Transactions already tracked when the tick starts. Anything
        // broadcast during this tick is excluded from this tick's
        // rebroadcast sweep; it was just submitted.
        let carried: Vec<TxId> = self
            .confirming
            .lock()
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default();

        let entries: Vec<PendingEntry> = match self.pending.lock() {
            Ok(mut pending) => {
                let ids: Vec<ProposalId> = pending.keys().cloned().collect();
                ids.into_iter()
                    .filter_map(|id| pending.remove(&id))
                    .collect()
            }
            Err(_) => Vec::new(),
        };

        for entry in entries {
            if entry.queued_at.elapsed() >= self.config.expiry {
                warn!(proposal = %entry.proposal.id, "proposal expired");
                self.utxos.release_utxos(&entry.proposal.id);
                let _ = entry
                    .responder
                    .send(Err(ProposalError::Expired(entry.proposal.id.clone())));
                continue;
            }
            match self.attempt(&entry.proposal, ctx) {
                AttemptOutcome::Built(tx) => {
                    let txid = tx.txid();
                    debug!(proposal = %entry.proposal.id, txid = %txid, "broadcast");
                    let _ = entry.responder.send(Ok(txid.clone()));
                    if let Ok(mut confirming) = self.confirming.lock() {
                        confirming.insert(
                            txid,
                            ConfirmingEntry {
                                tx,
                                last_broadcast: Instant::now(),
                            },
                        );
                    }
                }
                AttemptOutcome::Retry => {
                    debug!(proposal = %entry.proposal.id, "build deferred to next tick");
                    if let Ok(mut pending) = self.pending.lock() {
                        // The same id may have been re-added while the
                        // attempt ran without the lock. The retried
                        // original keeps its slot; the newcomer resolves
                        // as a duplicate rather than vanishing.
                        if let Some(displaced) = pending.insert(entry.proposal.id.clone(), entry)
                        {
                            let _ = displaced.responder.send(Err(ProposalError::Duplicate(
                                displaced.proposal.id.clone(),
                            )));
                        }
                    }
                }
                AttemptOutcome::Failed(err) => {
                    warn!(proposal = %entry.proposal.id, error = %err, "proposal failed");
                    let _ = entry.responder.send(Err(err));
                }
            }
        }

        self.rebroadcast(&carried);

        self.pending_count() > 0
            || self.confirming.lock().map(|c| !c.is_empty()).unwrap_or(false)
    }

    /// Build and broadcast one proposal, releasing every reservation on
    /// any failure path.
    fn attempt(&self, proposal: &Proposal, ctx: &PassphraseContext) -> AttemptOutcome {
        let request = &proposal.request;
        let mut builder = match TransactionBuilder::new(proposal.chain, request.fee_rate) {
            Ok(b) => b,
            Err(e) => return AttemptOutcome::Failed(e.into()),
        };

        let coins = match self.utxos.reserve_utxos(&proposal.id, request.total_value()) {
            Ok(coins) if !coins.is_empty() => coins,
            Ok(_) | Err(_) => {
                self.utxos.release_utxos(&proposal.id);
                return AttemptOutcome::Retry;
            }
        };
        for coin in coins {
            if let Err(e) = builder.add_input(coin) {
                return self.fail(proposal, &builder, e);
            }
        }
        if let Err(e) = builder.create_outputs(request) {
            return self.fail(proposal, &builder, e);
        }
        if let Err(e) = builder.add_change(request, self.keys.as_ref(), &proposal.id) {
            return self.fail(proposal, &builder, e);
        }

        // Coin selection may have come up short; ask the source to top up
        // once before deferring.
        if !builder.is_funded() {
            let shortfall =
                (builder.output_value() + builder.required_fee() + 1).saturating_sub(builder.input_value());
            match self.utxos.reserve_utxos(&proposal.id, shortfall) {
                Ok(extra) if !extra.is_empty() => {
                    for coin in extra {
                        if let Err(e) = builder.add_input(coin) {
                            return self.fail(proposal, &builder, e);
                        }
                    }
                }
                Ok(_) | Err(_) => return self.defer(proposal, &builder),
            }
        }

        if let Err(e) = builder.finalize_outputs(self.keys.as_ref(), &proposal.id) {
            return match e {
                BuildError::NotFunded { .. } => self.defer(proposal, &builder),
                other => self.fail(proposal, &builder, other),
            };
        }
        if let Err(e) = builder.sign_inputs(self.keys.as_ref(), ctx) {
            return match e {
                BuildError::KeyUnavailable(_) => self.defer(proposal, &builder),
                other => self.fail(proposal, &builder, other),
            };
        }

        let change_key = builder.reserved_change_key().cloned();
        let tx = match builder.finalize_transaction() {
            Ok(tx) => tx,
            Err(e) => {
                if let Some(key) = change_key {
                    self.keys.release_change_key(&proposal.id, &key);
                }
                self.utxos.release_utxos(&proposal.id);
                return AttemptOutcome::Failed(e.into());
            }
        };

        match self.broadcaster.broadcast(&tx) {
            Ok(()) => AttemptOutcome::Built(tx),
            Err(BroadcastFailure::Temporary(msg)) => {
                debug!(proposal = %proposal.id, reason = %msg, "broadcast deferred");
                if let Some(key) = change_key {
                    self.keys.release_change_key(&proposal.id, &key);
                }
                self.utxos.release_utxos(&proposal.id);
                AttemptOutcome::Retry
            }
            Err(BroadcastFailure::Permanent(msg)) => {
                if let Some(key) = change_key {
                    self.keys.release_change_key(&proposal.id, &key);
                }
                self.utxos.release_utxos(&proposal.id);
                AttemptOutcome::Failed(ProposalError::Broadcast(msg))
            }
        }
    }

    fn release(&self, proposal: &Proposal, builder: &TransactionBuilder) {
        if let Some(key) = builder.reserved_change_key() {
            self.keys.release_change_key(&proposal.id, key);
        }
        self.utxos.release_utxos(&proposal.id);
    }

    fn defer(&self, proposal: &Proposal, builder: &TransactionBuilder) -> AttemptOutcome {
        self.release(proposal, builder);
        AttemptOutcome::Retry
    }

    fn fail(
        &self,
        proposal: &Proposal,
        builder: &TransactionBuilder,
        err: BuildError,
    ) -> AttemptOutcome {
        // Change-key exhaustion is a resource condition, not a defect.
        let outcome = match err {
            BuildError::ChangeKeysExhausted => AttemptOutcome::Retry,
            other => AttemptOutcome::Failed(other.into()),
        };
        self.release(proposal, builder);
        outcome
    }

    /// Resubmit the given unconfirmed transactions once they are past
    /// the rebroadcast interval.
    fn rebroadcast(&self, txids: &[TxId]) {
        let mut confirming = match self.confirming.lock() {
            Ok(c) => c,
            Err(_) => return,
        };
        let mut rejected = Vec::new();
        for txid in txids {
            let entry = match confirming.get_mut(txid) {
                Some(entry) => entry,
                None => continue,
            };
            if entry.last_broadcast.elapsed() < self.config.rebroadcast_interval {
                continue;
            }
            match self.broadcaster.broadcast(&entry.tx) {
                Ok(()) | Err(BroadcastFailure::Temporary(_)) => {
                    entry.last_broadcast = Instant::now();
                }
                Err(BroadcastFailure::Permanent(msg)) => {
                    warn!(txid = %txid, reason = %msg, "rebroadcast rejected, dropping");
                    rejected.push(txid.clone());
                }
            }
        }
        for txid in rejected {
            confirming.remove(&txid);
        }
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> ProposalError {
    ProposalError::Internal("manager state poisoned".to_string())
}
