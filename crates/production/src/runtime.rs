//! Wires every component into the thing the validator binary actually
//! runs: the pure `NodeStateMachine` plus the I/O-bound collaborators its
//! `Action`s drive — the store, the cache, the two-legged signer, the
//! settlement chain client, and checkpoint/reconciliation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rollup_cache::{CacheConfig, MultiLevelCache};
use rollup_core::{Action, Event, Metric, RejectReason, StateMachine};
use rollup_hsm::SoftHsm;
use rollup_node::NodeStateMachine;
use rollup_recovery::{read_checkpoint, write_checkpoint, Checkpoint, CheckpointPolicy, Reconciler, SettlementClient, SettlementQueryError};
use rollup_resilience::CircuitBreakerConfig;
use rollup_sequencer::{SequencerConfig, TxSequencer};
use rollup_store::{ShardedStore, ShardedStoreConfig, ShardingStrategy};
use rollup_types::{Address, BatchId, StateRecord, Transaction, TxId, TxStatus};
use tracing::{info, warn};

use crate::config::Config;
use crate::metrics::AppMetrics;
use crate::settlement::SettlementChainClient;
use crate::signer::SigningCoordinator;

/// Outcome of a single synchronous `submit` call: what the caller should
/// tell the gateway client immediately, before any batch this transaction
/// ends up in has been sealed or confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted(TxId),
    Rejected(RejectReason),
}

fn tx_state_record(tx: &Transaction) -> StateRecord {
    StateRecord {
        key: tx.id.to_string(),
        value: serde_json::to_value(tx).expect("Transaction always serializes"),
        version: match tx.status {
            TxStatus::Pending => 1,
            TxStatus::Confirmed | TxStatus::Rejected => 2,
            TxStatus::Challenged => 3,
        },
        updated_at_unix_seconds: 0,
    }
}

/// The full running node. One instance per `serve` invocation.
pub struct Node {
    state: Mutex<NodeStateMachine>,
    pub store: ShardedStore,
    pub cache: MultiLevelCache,
    pub metrics: AppMetrics,
    pub settlement: Arc<dyn SettlementChainClient>,
    hsm: Mutex<SoftHsm>,
    signer: Mutex<SigningCoordinator>,
    recovery: Mutex<(CheckpointPolicy, Reconciler)>,
    sender_index: DashMap<Address, Vec<TxId>>,
    pub config: Config,
    now: AtomicU64,
}

impl Node {
    pub fn new(config: Config, settlement: Arc<dyn SettlementChainClient>, now: u64) -> Self {
        let sequencer = TxSequencer::new(
            SequencerConfig {
                max_batch_size: config.max_batch_size,
                batch_interval_seconds: config.batch_interval.as_secs(),
                ..Default::default()
            },
            ChaCha20Rng::seed_from_u64(now),
        );
        let mut state = NodeStateMachine::new(sequencer);
        state.set_time(now);

        let store = ShardedStore::new(
            ShardingStrategy::ConsistentHash(rollup_store::ConsistentHashRing::new(config.shard_count, 100)),
            (0..config.shard_count).map(|_| Arc::new(rollup_store::InMemoryBackend::new()) as rollup_store::SharedBackend).collect(),
            ShardedStoreConfig {
                replicas: config.replication_factor,
                query_cache_capacity: config.cache_base_capacity,
                query_cache_ttl: config.cache_base_ttl,
            },
        );
        let cache = MultiLevelCache::new(CacheConfig { base_capacity: config.cache_base_capacity, base_ttl: config.cache_base_ttl, ..Default::default() });

        let mut rng = ChaCha20Rng::seed_from_u64(now.wrapping_add(1));
        let mut hsm = SoftHsm::default();
        let signer = SigningCoordinator::bootstrap(&mut hsm, "batch-signing-key", 5, 3, now, &mut rng)
            .expect("bootstrap generates a fresh key id, never a duplicate");

        let recovery = (CheckpointPolicy::new(config.checkpoint_interval), Reconciler::new(CircuitBreakerConfig::default()));

        Self {
            state: Mutex::new(state),
            store,
            cache,
            metrics: AppMetrics::new(),
            settlement,
            hsm: Mutex::new(hsm),
            signer: Mutex::new(signer),
            recovery: Mutex::new(recovery),
            sender_index: DashMap::new(),
            config,
            now: AtomicU64::new(now),
        }
    }

    /// Restore from a checkpoint at `checkpoint_path`, if one exists, and
    /// enqueue every in-flight batch it names for reconciliation.
    pub fn restore_checkpoint(&self) -> anyhow::Result<()> {
        let Some(checkpoint) = read_checkpoint(std::path::Path::new(&self.config.checkpoint_path))? else {
            info!("no checkpoint found, starting from an empty sequencer");
            return Ok(());
        };
        let mut state = self.state.lock();
        state.sequencer_mut().restore_from(checkpoint.sequencer);
        let mut recovery = self.recovery.lock();
        recovery.1.enqueue_in_flight(state.sequencer());
        info!(pending = recovery.1.pending_count(), "restored checkpoint, queued in-flight batches for reconciliation");
        Ok(())
    }

    pub fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    fn set_now(&self, now: u64) {
        self.now.store(now, Ordering::SeqCst);
        self.state.lock().set_time(now);
    }

    /// Validate, queue, and (synchronously) act on the immediate
    /// `AcceptTx`/`RejectTx` decision for a submitted transaction.
    /// `SubmitBatch`/`WriteCheckpoint`/`RecordMetric` actions produced by
    /// the same event are applied the same way as any other tick.
    pub async fn submit(&self, mut tx: Transaction, priority: Option<u8>) -> SubmitOutcome {
        tx.id = tx.compute_id();
        let event = match priority {
            Some(p) => Event::SubmitPriorityTx(tx.clone(), p),
            None => Event::SubmitTx(tx.clone()),
        };
        let actions = {
            let mut state = self.state.lock();
            state.handle(event)
        };
        let outcome = actions.iter().find_map(|a| match a {
            Action::AcceptTx(id) => Some(SubmitOutcome::Accepted(*id)),
            Action::RejectTx(_, reason) => Some(SubmitOutcome::Rejected(reason.clone())),
            _ => None,
        });
        if let SubmitOutcome::Accepted(_) = outcome.as_ref().unwrap_or(&SubmitOutcome::Rejected(RejectReason::BadType)) {
            self.store.put(tx_state_record(&tx)).await.ok();
            if let Ok(bytes) = serde_json::to_vec(&tx) {
                self.cache.set(&tx.id.to_string(), &bytes);
            }
            self.sender_index.entry(tx.sender).or_default().push(tx.id);
        }
        self.apply_actions(actions).await;
        outcome.unwrap_or(SubmitOutcome::Rejected(RejectReason::BadType))
    }

    /// Look up a transaction, preferring the cache and backfilling it on a
    /// miss.
    pub async fn get_transaction(&self, id: TxId) -> Option<Transaction> {
        let key = id.to_string();
        if let Ok(Some(bytes)) = self.cache.get(&key) {
            if let Ok(tx) = serde_json::from_slice::<Transaction>(&bytes) {
                return Some(tx);
            }
        }
        let record = self.store.get(&key).await.ok()??;
        let tx: Transaction = serde_json::from_value(record.value).ok()?;
        if let Ok(bytes) = serde_json::to_vec(&tx) {
            self.cache.set(&key, &bytes);
        }
        Some(tx)
    }

    /// Most-recent-first transactions for `sender`, paginated.
    pub async fn get_transactions_by_sender(&self, sender: Address, limit: usize, offset: usize) -> Vec<Transaction> {
        let Some(entry) = self.sender_index.get(&sender) else { return Vec::new() };
        let mut ids: Vec<TxId> = entry.value().clone();
        drop(entry);
        ids.reverse();
        let mut out = Vec::new();
        for id in ids.into_iter().skip(offset).take(limit) {
            if let Some(tx) = self.get_transaction(id).await {
                out.push(tx);
            }
        }
        out
    }

    /// Advance wall-clock time by one tick, applying whatever actions that
    /// produces (typically `SubmitBatch` once the interval or size limit
    /// is crossed).
    pub async fn tick(&self, now: u64) {
        self.set_now(now);
        let actions = {
            let mut state = self.state.lock();
            state.handle(Event::Tick { now_unix_seconds: now })
        };
        self.apply_actions(actions).await;
        self.cache.sweep_demotions();
        self.signer.lock().hsm_key_mut().advance_time(now);
        self.run_reconciliation_cycle(now).await;
    }

    async fn run_reconciliation_cycle(&self, now: u64) {
        let client = SettlementClientAdapter(&*self.settlement);
        let resolution = {
            let mut state = self.state.lock();
            let mut recovery = self.recovery.lock();
            recovery.1.run_one_cycle(state.sequencer_mut(), &client, Instant::now())
        };
        let _ = (resolution, now);
    }

    async fn apply_actions(&self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::AcceptTx(_) => {}
                Action::RejectTx(_, _) => {}
                Action::SubmitBatch { batch, txs } => self.seal_and_submit_batch(batch, txs).await,
                Action::WriteCheckpoint => self.write_checkpoint_now(),
                Action::RecordMetric(metric) => self.record_metric(metric),
            }
        }
    }

    async fn seal_and_submit_batch(&self, mut batch: rollup_types::Batch, txs: Vec<Transaction>) {
        let now = self.now();
        let (hsm_sig, r, s) = {
            let hsm = self.hsm.lock();
            let signer = self.signer.lock();
            match signer.sign_batch_root(&*hsm, &batch.root, now, now + 60, &mut ChaCha20Rng::seed_from_u64(now)) {
                Ok(sig) => sig,
                Err(e) => {
                    warn!(error = %e, batch = ?batch.id, "failed to co-sign batch, leaving it unsigned and in-flight");
                    return;
                }
            }
        };
        batch.attach_signature(&hsm_sig, &r, &s);

        if let Err(e) = self.settlement.submit_batch(&batch, &txs).await {
            warn!(error = %e, batch = ?batch.id, "settlement submission failed; reconciliation will retry later");
        }

        let mut recovery = self.recovery.lock();
        if recovery.0.record_processed(txs.len() as u64) {
            drop(recovery);
            self.write_checkpoint_now();
        }
    }

    fn write_checkpoint_now(&self) {
        let snapshot = self.state.lock().sequencer().snapshot();
        let checkpoint = Checkpoint { sequencer: snapshot, created_at: self.now() };
        if let Err(e) = write_checkpoint(&checkpoint, std::path::Path::new(&self.config.checkpoint_path)) {
            warn!(error = %e, "failed to write checkpoint");
        }
    }

    fn record_metric(&self, metric: Metric) {
        match metric {
            Metric::TxAccepted => self.metrics.tx_accepted_total.inc(),
            Metric::TxRejected { reason } => self.metrics.tx_rejected_total.with_label_values(&[reason_label(&reason)]).inc(),
            Metric::BatchSealed { tx_count } => {
                self.metrics.batches_sealed_total.inc();
                self.metrics.queue_depth.with_label_values(&["last_batch_size"]).set(tx_count as f64);
            }
            Metric::BatchConfirmed => self.metrics.batches_confirmed_total.inc(),
            Metric::QueueDepth { fifo, priority } => {
                self.metrics.queue_depth.with_label_values(&["fifo"]).set(fifo as f64);
                self.metrics.queue_depth.with_label_values(&["priority"]).set(priority as f64);
            }
            Metric::BackpressureEntered | Metric::BackpressureExited => self.metrics.backpressure_events.inc(),
        }
    }

    /// Refresh the cache-hit-rate and compression-ratio gauges from the
    /// cache's own running counters.
    pub fn refresh_cache_gauges(&self) {
        let stats = self.cache.stats();
        let total = (stats.hits_l1 + stats.hits_l2 + stats.hits_l3 + stats.misses).max(1) as f64;
        self.metrics.cache_hit_rate.with_label_values(&["l1"]).set(stats.hits_l1 as f64 / total);
        self.metrics.cache_hit_rate.with_label_values(&["l2"]).set(stats.hits_l2 as f64 / total);
        self.metrics.cache_hit_rate.with_label_values(&["l3"]).set(stats.hits_l3 as f64 / total);
        self.metrics.compression_ratio.set(stats.compression_ratio);
    }

    /// Readiness aggregate over store shard health: `healthy` when every
    /// shard is, `critical` below 50% healthy, `degraded` otherwise.
    pub async fn store_health_status(&self) -> &'static str {
        let shards = self.store.health_check_all().await;
        if shards.is_empty() {
            return "healthy";
        }
        let healthy = shards.iter().filter(|(_, ok)| *ok).count();
        let ratio = healthy as f64 / shards.len() as f64;
        if healthy == shards.len() {
            "healthy"
        } else if ratio < 0.5 {
            "critical"
        } else {
            "degraded"
        }
    }

    pub fn dependency_health(&self) -> HashMap<String, bool> {
        self.state.lock().health().iter().map(|(k, v)| (k.clone(), *v)).collect()
    }

    /// Discrepancies still queued for settlement reconciliation.
    pub fn reconciliation_pending_count(&self) -> usize {
        self.recovery.lock().1.pending_count()
    }
}

/// Lets the reconciler borrow the settlement chain through its narrower
/// `SettlementClient` contract without requiring trait-object upcasting
/// from `dyn SettlementChainClient`.
struct SettlementClientAdapter<'a>(&'a dyn SettlementChainClient);

impl SettlementClient for SettlementClientAdapter<'_> {
    fn is_batch_settled(&self, batch_id: BatchId) -> Result<bool, SettlementQueryError> {
        self.0.is_batch_settled(batch_id)
    }
}

fn reason_label(reason: &RejectReason) -> &'static str {
    match reason {
        RejectReason::InvalidSignature => "invalid_signature",
        RejectReason::BadAddress => "bad_address",
        RejectReason::NonPositiveAmount => "non_positive_amount",
        RejectReason::SelfTransfer => "self_transfer",
        RejectReason::BadType => "bad_type",
        RejectReason::Expired => "expired",
        RejectReason::DuplicateNonce => "duplicate_nonce",
        RejectReason::BackpressureActive => "backpressure_active",
    }
}
