//! `TxSequencer`: validates and queues submitted transactions, and seals
//! deterministic batches on a ticker or once the combined queue depth
//! crosses `max_batch_size`.

use std::collections::HashMap;

use rand::RngCore;
use rand_chacha::ChaCha20Rng;
use rollup_core::{Action, Event, Metric, RejectReason, StateMachine};
use rollup_types::{Address, BatchId, Transaction, TxStatus};
use serde::{Deserialize, Serialize};

use crate::batching;
use crate::fee_market::FeeMarket;
use crate::nonce::NonceTracker;
use crate::queue::Queues;
use crate::validation::{validate, ValidationConfig};

pub struct SequencerConfig {
    pub max_batch_size: usize,
    pub batch_interval_seconds: u64,
    pub default_max_age_seconds: u64,
    pub sequencer_pk: [u8; 32],
    pub base_fee: u64,
    pub fee_multiplier_percent: u64,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 500,
            batch_interval_seconds: 2,
            default_max_age_seconds: 3600,
            sequencer_pk: [0u8; 32],
            base_fee: 1,
            fee_multiplier_percent: 112,
        }
    }
}

pub struct TxSequencer {
    config: SequencerConfig,
    queues: Queues,
    nonces: NonceTracker,
    fee_market: FeeMarket,
    in_flight: HashMap<BatchId, Vec<Transaction>>,
    batch_counter: u64,
    processed_counter: u64,
    last_confirmed_batch_id: Option<BatchId>,
    last_batch_at: u64,
    now: u64,
    rng: ChaCha20Rng,
}

/// Durable snapshot of sequencer state, for `rollup-recovery` checkpoints:
/// the pending and priority queues, per-sender nonce counters, the batch
/// and processed counters, and the last confirmed batch id.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SequencerSnapshot {
    pub fifo: Vec<Transaction>,
    pub priority: Vec<(u8, Transaction)>,
    /// `(sender, next_nonce)` pairs. A plain list rather than a map: JSON
    /// object keys must be strings, and `Address` isn't one.
    pub nonces: Vec<(Address, u64)>,
    pub batch_counter: u64,
    pub processed_counter: u64,
    pub last_confirmed_batch_id: Option<BatchId>,
    /// Batches sealed but not yet confirmed or rejected, for
    /// settlement-layer reconciliation on restart.
    pub in_flight: Vec<(BatchId, Vec<Transaction>)>,
}

impl TxSequencer {
    pub fn new(config: SequencerConfig, rng: ChaCha20Rng) -> Self {
        let base_fee = config.base_fee;
        let multiplier = config.fee_multiplier_percent;
        Self {
            config,
            queues: Queues::new(),
            nonces: NonceTracker::new(),
            fee_market: FeeMarket::new(base_fee, multiplier),
            in_flight: HashMap::new(),
            batch_counter: 0,
            processed_counter: 0,
            last_confirmed_batch_id: None,
            last_batch_at: 0,
            now: 0,
            rng,
        }
    }

    /// Capture everything `rollup-recovery` needs to checkpoint and later
    /// restore this sequencer's state.
    pub fn snapshot(&self) -> SequencerSnapshot {
        let (fifo, priority) = self.queues.snapshot();
        SequencerSnapshot {
            fifo,
            priority,
            nonces: self.nonces.snapshot().into_iter().collect(),
            batch_counter: self.batch_counter,
            processed_counter: self.processed_counter,
            last_confirmed_batch_id: self.last_confirmed_batch_id,
            in_flight: self.in_flight.clone().into_iter().collect(),
        }
    }

    /// Restore queues, nonce counters, and counters from a checkpoint.
    /// In-flight batches are not part of the snapshot: on restart they are
    /// reconciled against the settlement layer instead of replayed here.
    pub fn restore_from(&mut self, snapshot: SequencerSnapshot) {
        self.queues.restore(snapshot.fifo, snapshot.priority);
        self.nonces.restore(snapshot.nonces.into_iter().collect());
        self.batch_counter = snapshot.batch_counter;
        self.processed_counter = snapshot.processed_counter;
        self.last_confirmed_batch_id = snapshot.last_confirmed_batch_id;
        self.in_flight = snapshot.in_flight.into_iter().collect();
    }

    /// Directly mark a batch confirmed/rejected during reconciliation,
    /// without going through `StateMachine::handle` (no `Event` exists for
    /// "this was already settled before we even reloaded the checkpoint").
    pub fn reconcile_confirmed(&mut self, batch_id: BatchId) {
        self.confirm(batch_id);
    }

    pub fn reconcile_rejected(&mut self, batch_id: BatchId) {
        self.reject_batch(batch_id);
    }

    pub fn in_flight_batches(&self) -> impl Iterator<Item = (&BatchId, &Vec<Transaction>)> {
        self.in_flight.iter()
    }

    pub fn current_base_fee(&self) -> u64 {
        self.fee_market.current()
    }

    fn validation_config(&self) -> ValidationConfig {
        ValidationConfig { default_max_age_seconds: self.config.default_max_age_seconds }
    }

    fn intake(&mut self, tx: Transaction, priority: Option<u8>) -> Vec<Action> {
        match validate(&tx, self.now, &self.nonces, &self.validation_config()) {
            Ok(nonce) => {
                self.nonces.advance(tx.sender, nonce);
                let tx_id = tx.id;
                match priority {
                    Some(p) => self.queues.push_priority(tx, p.clamp(1, 10)),
                    None => self.queues.push_fifo(tx),
                }
                vec![Action::AcceptTx(tx_id), Action::RecordMetric(Metric::TxAccepted)]
            }
            Err(reason) => vec![
                Action::RejectTx(tx.id, reason.clone()),
                Action::RecordMetric(Metric::TxRejected { reason }),
            ],
        }
    }

    fn should_seal(&self) -> bool {
        self.queues.total_len() >= self.config.max_batch_size
            || self.now.saturating_sub(self.last_batch_at) >= self.config.batch_interval_seconds
    }

    fn seal_batch(&mut self) -> Vec<Action> {
        if self.queues.total_len() == 0 {
            self.last_batch_at = self.now;
            return vec![];
        }

        let txs = self.queues.drain_batch(self.config.max_batch_size, self.now);
        self.last_batch_at = self.now;
        if txs.is_empty() {
            return vec![];
        }

        let mut nonce_bytes = [0u8; 16];
        self.rng.fill_bytes(&mut nonce_bytes);

        let batch = batching::assemble(
            &txs,
            self.config.sequencer_pk,
            self.now,
            self.now + self.config.default_max_age_seconds,
            self.batch_counter,
            nonce_bytes,
        );
        self.batch_counter += 1;
        self.in_flight.insert(batch.id, txs.clone());
        tracing::debug!(batch_id = %batch.id, tx_count = txs.len(), "sealed batch");

        vec![
            Action::RecordMetric(Metric::BatchSealed { tx_count: txs.len() }),
            Action::SubmitBatch { batch, txs },
        ]
    }

    fn confirm(&mut self, batch_id: BatchId) -> Vec<Action> {
        if self.in_flight.remove(&batch_id).is_some() {
            self.processed_counter += 1;
            self.last_confirmed_batch_id = Some(batch_id);
            vec![Action::RecordMetric(Metric::BatchConfirmed), Action::WriteCheckpoint]
        } else {
            vec![]
        }
    }

    fn reject_batch(&mut self, batch_id: BatchId) -> Vec<Action> {
        let Some(txs) = self.in_flight.remove(&batch_id) else { return vec![] };
        tracing::warn!(batch_id = %batch_id, tx_count = txs.len(), "batch rejected, requeuing");
        for mut tx in txs.into_iter().rev() {
            if tx.expiry_unix_seconds > self.now {
                tx.status = TxStatus::Pending;
                self.queues.requeue_front(tx);
            }
        }
        vec![]
    }
}

impl StateMachine for TxSequencer {
    fn handle(&mut self, event: Event) -> Vec<Action> {
        match event {
            Event::SubmitTx(tx) => self.intake(tx, None),
            Event::SubmitPriorityTx(tx, priority) => self.intake(tx, Some(priority)),
            Event::Tick { now_unix_seconds } => {
                self.now = now_unix_seconds;
                if self.should_seal() {
                    self.seal_batch()
                } else {
                    vec![]
                }
            }
            Event::BatchConfirmed(batch_id) => self.confirm(batch_id),
            Event::BatchRejected(batch_id, _reason) => self.reject_batch(batch_id),
            Event::DependencyHealthChanged { .. } => vec![],
            Event::ForceCheckpoint => vec![Action::WriteCheckpoint],
        }
    }

    fn set_time(&mut self, now_unix_seconds: u64) {
        self.now = now_unix_seconds;
    }

    fn now(&self) -> u64 {
        self.now
    }
}
