//! Per-sender nonce tracking: the next expected nonce, strictly increasing.

use std::collections::HashMap;

use rollup_types::Address;

#[derive(Default)]
pub struct NonceTracker {
    next: HashMap<Address, u64>,
}

impl NonceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// The nonce `sender`'s next accepted transaction must carry. A sender
    /// with no accepted history yet starts at 1, not 0 — the first
    /// transaction a sender ever submits carries nonce 1.
    pub fn next_nonce(&self, sender: Address) -> u64 {
        self.next.get(&sender).copied().unwrap_or(1)
    }

    /// Record that `sender`'s transaction at `nonce` was accepted, advancing
    /// their counter to `nonce + 1`.
    pub fn advance(&mut self, sender: Address, nonce: u64) {
        self.next.insert(sender, nonce + 1);
    }

    /// Snapshot the per-sender counters, for checkpointing.
    pub fn snapshot(&self) -> HashMap<Address, u64> {
        self.next.clone()
    }

    /// Replace the counters wholesale, e.g. when restoring from a checkpoint.
    pub fn restore(&mut self, counters: HashMap<Address, u64>) {
        self.next = counters;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_sender_starts_at_one() {
        let tracker = NonceTracker::new();
        assert_eq!(tracker.next_nonce(Address::new([1u8; 32])), 1);
    }

    #[test]
    fn advancing_bumps_the_next_expected_nonce() {
        let mut tracker = NonceTracker::new();
        let sender = Address::new([1u8; 32]);
        tracker.advance(sender, 1);
        assert_eq!(tracker.next_nonce(sender), 2);
        tracker.advance(sender, 2);
        assert_eq!(tracker.next_nonce(sender), 3);
    }

    #[test]
    fn senders_are_tracked_independently() {
        let mut tracker = NonceTracker::new();
        let a = Address::new([1u8; 32]);
        let b = Address::new([2u8; 32]);
        tracker.advance(a, 1);
        assert_eq!(tracker.next_nonce(a), 2);
        assert_eq!(tracker.next_nonce(b), 1);
    }
}
