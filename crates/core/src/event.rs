//! The closed set of events that can drive a `StateMachine`.

use rollup_types::{BatchId, Transaction, TxId};

/// An input to a `StateMachine`. Encoded as a tagged variant (per the
/// design note against stringly-typed dispatch), never a dynamic event
/// name.
#[derive(Clone, Debug)]
pub enum Event {
    /// A gateway-delivered FIFO submission.
    SubmitTx(Transaction),
    /// A gateway-delivered priority submission, priority in `[1, 10]`.
    SubmitPriorityTx(Transaction, u8),
    /// Advance the state machine's notion of time.
    Tick { now_unix_seconds: u64 },
    /// The settlement chain confirmed a previously submitted batch.
    BatchConfirmed(BatchId),
    /// The settlement chain rejected a previously submitted batch.
    BatchRejected(BatchId, String),
    /// A dependency (store, HSM, settlement chain) reported a health
    /// transition by name.
    DependencyHealthChanged { dependency: String, healthy: bool },
    /// Request an immediate checkpoint write regardless of the interval.
    ForceCheckpoint,
}

/// Identifies a transaction within an `Event` that produced it, for
/// correlating outbound `Action`s back to the request that caused them.
impl Event {
    /// The transaction id this event concerns, if any.
    pub fn tx_id(&self) -> Option<TxId> {
        match self {
            Event::SubmitTx(tx) | Event::SubmitPriorityTx(tx, _) => Some(tx.id),
            _ => None,
        }
    }
}
