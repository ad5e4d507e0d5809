//! Per-dependency failure isolation (Component C): a three-state circuit
//! breaker plus an exponential-backoff retry policy with jitter.

mod circuit_breaker;
mod retry;

pub use circuit_breaker::{CallPermission, CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use retry::RetryPolicy;
