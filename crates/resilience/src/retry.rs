//! Exponential backoff with multiplicative jitter.

use rand::Rng;
use std::time::Duration;

/// Configuration for a backoff sequence: `initial * factor^n`, capped by
/// `max`, each draw jittered by `[1-jitter, 1+jitter]`.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub initial: Duration,
    pub factor: f64,
    pub max: Duration,
    pub jitter: f64,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(100),
            factor: 2.0,
            max: Duration::from_secs(30),
            jitter: 0.2,
            max_attempts: 5,
        }
    }
}

impl RetryPolicy {
    /// Backoff duration for the `attempt`-th retry (0-based), before
    /// jitter.
    fn unjittered_delay(&self, attempt: u32) -> Duration {
        let scaled = self.initial.as_secs_f64() * self.factor.powi(attempt as i32);
        Duration::from_secs_f64(scaled.min(self.max.as_secs_f64()))
    }

    /// Backoff duration for `attempt`, jittered using `rng`.
    pub fn delay_with_rng(&self, attempt: u32, rng: &mut impl Rng) -> Duration {
        let base = self.unjittered_delay(attempt);
        let factor = rng.gen_range((1.0 - self.jitter)..=(1.0 + self.jitter));
        Duration::from_secs_f64((base.as_secs_f64() * factor).max(0.0))
    }

    /// Backoff duration using the thread-local RNG.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.delay_with_rng(attempt, &mut rand::thread_rng())
    }

    /// Whether a given attempt number (0-based, already made) still leaves
    /// room for another try.
    pub fn should_retry(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }

    /// The default "is retriable" predicate: network/timeout kinds,
    /// 5xx-equivalent upstream errors, rate-limit signals, and the named
    /// settlement-chain transient conditions.
    pub fn is_default_retriable_message(message: &str) -> bool {
        const TRANSIENT_MARKERS: &[&str] = &[
            "timeout",
            "timed out",
            "connection reset",
            "connection refused",
            "rate limit",
            "too many requests",
            "blockhash not found",
            "block height exceeded",
            "simulation failed",
        ];
        let lower = message.to_lowercase();
        TRANSIENT_MARKERS.iter().any(|m| lower.contains(m))
            || message.starts_with('5') && message.len() == 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn delay_grows_exponentially_before_jitter() {
        let policy = RetryPolicy {
            jitter: 0.0,
            ..Default::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let d0 = policy.delay_with_rng(0, &mut rng);
        let d1 = policy.delay_with_rng(1, &mut rng);
        let d2 = policy.delay_with_rng(2, &mut rng);
        assert_eq!(d0, policy.initial);
        assert_eq!(d1, policy.initial * 2);
        assert_eq!(d2, policy.initial * 4);
    }

    #[test]
    fn delay_is_capped_at_max() {
        let policy = RetryPolicy {
            initial: Duration::from_secs(10),
            factor: 10.0,
            max: Duration::from_secs(20),
            jitter: 0.0,
            max_attempts: 5,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(policy.delay_with_rng(5, &mut rng), Duration::from_secs(20));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let policy = RetryPolicy {
            jitter: 0.5,
            ..Default::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let base = policy.unjittered_delay(1).as_secs_f64();
        for _ in 0..100 {
            let d = policy.delay_with_rng(1, &mut rng).as_secs_f64();
            assert!(d >= base * 0.5 - 1e-9 && d <= base * 1.5 + 1e-9);
        }
    }

    #[test]
    fn max_attempts_bounds_retries() {
        let policy = RetryPolicy { max_attempts: 3, ..Default::default() };
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }

    #[test]
    fn recognises_settlement_chain_transient_errors() {
        assert!(RetryPolicy::is_default_retriable_message("blockhash not found"));
        assert!(RetryPolicy::is_default_retriable_message("Simulation Failed: oops"));
        assert!(!RetryPolicy::is_default_retriable_message("invalid signature"));
    }
}
