//! The error taxonomy shared by every component.
//!
//! Components raise their own leaf error enums; at the boundary the runner
//! sees, those convert into one of these kinds so propagation policy (what
//! gets retried, what degrades readiness, what surfaces to the gateway) can
//! be decided in one place.

use thiserror::Error;

/// A rollup-wide error kind. Never constructed directly from user input —
/// leaf errors in each component convert into this via `From`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Synchronous, user-visible, never retried.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Caller should slow down; surfaced as HTTP 503 with a hint.
    #[error("backpressure active: {0}")]
    Backpressure(String),

    /// Settlement chain, HSM, or store unreachable; retried by policy.
    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),

    /// A TSS session missing a party or timing out.
    #[error("transient crypto failure: {0}")]
    TransientCrypto(String),

    /// Merkle or signature verification failed after assembly.
    #[error("integrity violation: {0}")]
    IntegrityViolation(String),

    /// A checkpoint or persisted blob could not be decoded.
    #[error("corruption: {0}")]
    Corruption(String),

    /// Covers-all; always logged with full context.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether this kind is, in principle, retriable by a `RetryPolicy`.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            CoreError::DependencyUnavailable(_) | CoreError::TransientCrypto(_)
        )
    }

    /// Whether this kind should cause the readiness endpoint to degrade.
    pub fn degrades_readiness(&self) -> bool {
        matches!(
            self,
            CoreError::IntegrityViolation(_) | CoreError::Corruption(_)
        )
    }
}
