//! The closed set of side effects a `StateMachine` can request.
//!
//! Actions are data, not function calls: a `StateMachine::handle` never
//! performs I/O itself, it returns the actions the runner should perform.
//! This is the "replace event emitters with typed channels or explicit
//! callback traits" pattern applied to outbound effects as well as inbound
//! events.

use rollup_types::{Batch, Transaction, TxId};

/// Why a submitted transaction was refused.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RejectReason {
    InvalidSignature,
    BadAddress,
    NonPositiveAmount,
    SelfTransfer,
    BadType,
    Expired,
    DuplicateNonce,
    BackpressureActive,
}

/// A named measurement to forward to the metrics registry. Kept as a small
/// closed enum (not a string) so a new measurement can't be emitted without
/// updating every match on it.
#[derive(Clone, Debug)]
pub enum Metric {
    TxAccepted,
    TxRejected { reason: RejectReason },
    BatchSealed { tx_count: usize },
    BatchConfirmed,
    QueueDepth { fifo: usize, priority: usize },
    BackpressureEntered,
    BackpressureExited,
}

/// A side effect requested by a `StateMachine`.
#[derive(Clone, Debug)]
pub enum Action {
    /// Accept a submitted transaction.
    AcceptTx(TxId),
    /// Refuse a submitted transaction synchronously.
    RejectTx(TxId, RejectReason),
    /// Hand a sealed, signed batch to the settlement chain client.
    SubmitBatch { batch: Batch, txs: Vec<Transaction> },
    /// Persist a checkpoint now.
    WriteCheckpoint,
    /// Record a metrics observation.
    RecordMetric(Metric),
}
