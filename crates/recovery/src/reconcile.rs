//! Settlement-layer reconciliation: after restoring a checkpoint (or on a
//! steady-state timer), ask the settlement layer about each in-flight
//! batch and resolve it one way or the other.

use std::collections::VecDeque;
use std::time::Instant;

use rollup_resilience::{CallPermission, CircuitBreaker, CircuitBreakerConfig};
use rollup_sequencer::TxSequencer;
use rollup_types::BatchId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettlementQueryError {
    #[error("settlement layer unreachable: {0}")]
    Unreachable(String),
}

/// What `Recovery` needs from the settlement-chain collaborator: whether a
/// given batch has actually landed.
pub trait SettlementClient {
    fn is_batch_settled(&self, batch_id: BatchId) -> Result<bool, SettlementQueryError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Confirmed,
    Requeued,
    Skipped,
}

/// Drives reconciliation one discrepancy at a time: on restart the whole
/// in-flight set is enqueued; in steady state new discrepancies are
/// appended as they're discovered. A breaker around the settlement client
/// call opens after `circuit_breaker_threshold` consecutive failures and
/// closes again after `circuit_breaker_reset_time`.
pub struct Reconciler {
    pending: VecDeque<BatchId>,
    breaker: CircuitBreaker,
}

impl Reconciler {
    pub fn new(breaker_config: CircuitBreakerConfig) -> Self {
        Self { pending: VecDeque::new(), breaker: CircuitBreaker::new(breaker_config) }
    }

    /// Enqueue every batch the sequencer still considers in-flight, e.g.
    /// right after restoring a checkpoint.
    pub fn enqueue_in_flight(&mut self, sequencer: &TxSequencer) {
        for (batch_id, _) in sequencer.in_flight_batches() {
            self.pending.push_back(*batch_id);
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Resolve a single discrepancy, if the circuit breaker allows a call
    /// and there is one queued.
    pub fn run_one_cycle(
        &mut self,
        sequencer: &mut TxSequencer,
        client: &dyn SettlementClient,
        now: Instant,
    ) -> Resolution {
        if self.breaker.before_call(now) == CallPermission::Rejected {
            return Resolution::Skipped;
        }

        let Some(batch_id) = self.pending.pop_front() else { return Resolution::Skipped };

        match client.is_batch_settled(batch_id) {
            Ok(true) => {
                self.breaker.record_success();
                sequencer.reconcile_confirmed(batch_id);
                Resolution::Confirmed
            }
            Ok(false) => {
                self.breaker.record_success();
                sequencer.reconcile_rejected(batch_id);
                Resolution::Requeued
            }
            Err(_) => {
                self.breaker.record_failure(now);
                self.pending.push_back(batch_id);
                Resolution::Skipped
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use rollup_core::{Event, StateMachine};
    use rollup_sequencer::SequencerConfig;
    use rollup_types::{Address, Hash, Transaction, TxId, TxStatus, TxType};
    use std::cell::Cell;
    use std::time::Duration;

    fn tx(nonce: u64) -> Transaction {
        let base = Transaction {
            id: TxId::from(Hash::ZERO),
            sender: Address::new([1u8; 32]),
            recipient: Address::new([2u8; 32]),
            amount: 1,
            nonce,
            expiry_unix_seconds: 1_000_000,
            tx_type: TxType::Transfer,
            status: TxStatus::Pending,
            data: vec![],
            signature: vec![],
        };
        Transaction { id: base.compute_id(), ..base }
    }

    fn sequencer_with_one_in_flight_batch() -> (TxSequencer, BatchId) {
        let mut seq = TxSequencer::new(
            SequencerConfig { batch_interval_seconds: 1000, max_batch_size: 10, ..Default::default() },
            ChaCha20Rng::seed_from_u64(1),
        );
        seq.handle(Event::SubmitTx(tx(0)));
        let actions = seq.handle(Event::Tick { now_unix_seconds: 2000 });
        let batch_id = actions.iter().find_map(|a| match a {
            rollup_core::Action::SubmitBatch { batch, .. } => Some(batch.id),
            _ => None,
        }).unwrap();
        (seq, batch_id)
    }

    struct AlwaysSettled;
    impl SettlementClient for AlwaysSettled {
        fn is_batch_settled(&self, _batch_id: BatchId) -> Result<bool, SettlementQueryError> {
            Ok(true)
        }
    }

    struct NeverSettled;
    impl SettlementClient for NeverSettled {
        fn is_batch_settled(&self, _batch_id: BatchId) -> Result<bool, SettlementQueryError> {
            Ok(false)
        }
    }

    struct AlwaysFails;
    impl SettlementClient for AlwaysFails {
        fn is_batch_settled(&self, _batch_id: BatchId) -> Result<bool, SettlementQueryError> {
            Err(SettlementQueryError::Unreachable("down".to_string()))
        }
    }

    #[test]
    fn settled_batch_is_confirmed() {
        let (mut seq, _) = sequencer_with_one_in_flight_batch();
        let mut reconciler = Reconciler::new(CircuitBreakerConfig::default());
        reconciler.enqueue_in_flight(&seq);

        let resolution = reconciler.run_one_cycle(&mut seq, &AlwaysSettled, Instant::now());
        assert_eq!(resolution, Resolution::Confirmed);
        assert_eq!(seq.in_flight_batches().count(), 0);
    }

    #[test]
    fn unsettled_batch_is_requeued() {
        let (mut seq, _) = sequencer_with_one_in_flight_batch();
        let mut reconciler = Reconciler::new(CircuitBreakerConfig::default());
        reconciler.enqueue_in_flight(&seq);

        let resolution = reconciler.run_one_cycle(&mut seq, &NeverSettled, Instant::now());
        assert_eq!(resolution, Resolution::Requeued);
        assert_eq!(seq.in_flight_batches().count(), 0);
    }

    #[test]
    fn only_one_discrepancy_resolved_per_cycle() {
        let (mut seq, batch_id) = sequencer_with_one_in_flight_batch();
        let mut reconciler = Reconciler::new(CircuitBreakerConfig::default());
        reconciler.enqueue_in_flight(&seq);
        reconciler.pending.push_back(batch_id);
        assert_eq!(reconciler.pending_count(), 2);

        reconciler.run_one_cycle(&mut seq, &AlwaysSettled, Instant::now());
        assert_eq!(reconciler.pending_count(), 1);
    }

    #[test]
    fn repeated_failures_open_the_circuit_breaker() {
        let (mut seq, _) = sequencer_with_one_in_flight_batch();
        let config = CircuitBreakerConfig {
            failure_threshold: 2,
            success_threshold: 1,
            reset_timeout: Duration::from_secs(60),
        };
        let mut reconciler = Reconciler::new(config);
        reconciler.enqueue_in_flight(&seq);

        let t = Instant::now();
        reconciler.run_one_cycle(&mut seq, &AlwaysFails, t);
        reconciler.run_one_cycle(&mut seq, &AlwaysFails, t);
        // breaker is now open; a third cycle should skip without even
        // consulting the (still failing) client.
        let called = Cell::new(false);
        struct Spy<'a>(&'a Cell<bool>);
        impl<'a> SettlementClient for Spy<'a> {
            fn is_batch_settled(&self, _batch_id: BatchId) -> Result<bool, SettlementQueryError> {
                self.0.set(true);
                Ok(true)
            }
        }
        reconciler.run_one_cycle(&mut seq, &Spy(&called), t);
        assert!(!called.get(), "breaker should have skipped the call entirely");
    }

    #[test]
    fn no_pending_discrepancies_is_a_no_op() {
        let (mut seq, _) = sequencer_with_one_in_flight_batch();
        let mut reconciler = Reconciler::new(CircuitBreakerConfig::default());
        let resolution = reconciler.run_one_cycle(&mut seq, &AlwaysSettled, Instant::now());
        assert_eq!(resolution, Resolution::Skipped);
    }
}
