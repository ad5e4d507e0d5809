//! Store-level error taxonomy.

/// Errors surfaced by a shard backend or the routing layer above it.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("shard {0:?} has no healthy replica available")]
    NoHealthyReplica(crate::ring::ShardId),
    #[error("backend error: {0}")]
    Backend(String),
    #[error("transaction aborted: {0}")]
    TransactionAborted(String),
    #[error("stale write rejected: incoming version {incoming} <= stored version {stored}")]
    StaleWrite { incoming: u64, stored: u64 },
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}
