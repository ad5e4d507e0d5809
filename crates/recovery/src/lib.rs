//! Checkpoint persistence and settlement-layer reconciliation (Component
//! I): survive a restart without replaying from genesis, and resolve
//! whatever was in flight at the moment of the crash.

mod checkpoint;
mod reconcile;

pub use checkpoint::{read_checkpoint, write_checkpoint, Checkpoint, CheckpointError, CheckpointPolicy};
pub use reconcile::{Reconciler, Resolution, SettlementClient, SettlementQueryError};
