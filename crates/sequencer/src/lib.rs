//! Transaction intake, validation, two-tier queueing, and deterministic
//! batch assembly (Component F). Implements `rollup_core::StateMachine`;
//! signing and settlement submission are driven by the caller acting on
//! the `Action::SubmitBatch` this emits.

mod batching;
mod fee_market;
mod nonce;
mod queue;
mod sequencer;
mod signature;
mod validation;

pub use fee_market::FeeMarket;
pub use nonce::NonceTracker;
pub use sequencer::{SequencerConfig, SequencerSnapshot, TxSequencer};
