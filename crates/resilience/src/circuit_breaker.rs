//! Per-dependency circuit breaker.

use std::time::{Duration, Instant};

/// The three states of a circuit breaker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Configuration for one logical dependency.
#[derive(Clone, Copy, Debug)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

/// A single dependency's circuit breaker state machine. Not thread-safe by
/// itself — callers keep one per dependency behind whatever synchronization
/// their component already uses (the sequencer already serializes calls to
/// a given dependency).
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    opened_at: Option<Instant>,
}

/// Whether a call is currently permitted, and if not, why.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPermission {
    Allowed,
    Rejected,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: CircuitState::Closed,
            consecutive_failures: 0,
            consecutive_successes: 0,
            opened_at: None,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    /// Call before attempting the dependency call. `now` drives the
    /// Open -> Half-Open transition so this is a deterministic function of
    /// injected time rather than a hidden clock read.
    pub fn before_call(&mut self, now: Instant) -> CallPermission {
        if self.state == CircuitState::Open {
            if let Some(opened_at) = self.opened_at {
                if now.duration_since(opened_at) >= self.config.reset_timeout {
                    self.state = CircuitState::HalfOpen;
                    self.consecutive_successes = 0;
                }
            }
        }

        match self.state {
            CircuitState::Open => CallPermission::Rejected,
            CircuitState::Closed | CircuitState::HalfOpen => CallPermission::Allowed,
        }
    }

    /// Record a successful call.
    pub fn record_success(&mut self) {
        match self.state {
            CircuitState::Closed => {
                self.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                self.consecutive_successes += 1;
                if self.consecutive_successes >= self.config.success_threshold {
                    self.state = CircuitState::Closed;
                    self.consecutive_failures = 0;
                    self.consecutive_successes = 0;
                    self.opened_at = None;
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Record a failed call, as decided by the caller's `is_failure`
    /// predicate over the error.
    pub fn record_failure(&mut self, now: Instant) {
        match self.state {
            CircuitState::Closed => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= self.config.failure_threshold {
                    self.state = CircuitState::Open;
                    self.opened_at = Some(now);
                }
            }
            CircuitState::HalfOpen => {
                self.state = CircuitState::Open;
                self.opened_at = Some(now);
                self.consecutive_successes = 0;
            }
            CircuitState::Open => {}
        }
    }
}
