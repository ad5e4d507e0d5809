//! Two-tier intake queue: a priority queue sorted descending by priority,
//! and a plain FIFO for ordinary submissions.

use std::collections::VecDeque;

use rollup_types::Transaction;

#[derive(Default)]
pub struct Queues {
    fifo: VecDeque<Transaction>,
    /// Kept sorted descending by priority; ties broken by arrival order
    /// (insertion position among equal priorities).
    priority: Vec<(u8, Transaction)>,
}

impl Queues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_fifo(&mut self, tx: Transaction) {
        self.fifo.push_back(tx);
    }

    pub fn push_priority(&mut self, tx: Transaction, priority: u8) {
        let insert_at = self.priority.partition_point(|(p, _)| *p >= priority);
        self.priority.insert(insert_at, (priority, tx));
    }

    pub fn fifo_len(&self) -> usize {
        self.fifo.len()
    }

    pub fn priority_len(&self) -> usize {
        self.priority.len()
    }

    pub fn total_len(&self) -> usize {
        self.fifo_len() + self.priority_len()
    }

    /// Drain up to `max` transactions, priority-first then FIFO order,
    /// skipping (and dropping) any whose `expiry_unix_seconds` has already
    /// passed `now_unix_seconds`.
    pub fn drain_batch(&mut self, max: usize, now_unix_seconds: u64) -> Vec<Transaction> {
        let mut out = Vec::with_capacity(max);

        while out.len() < max {
            if self.priority.is_empty() {
                break;
            }
            let (_, tx) = self.priority.remove(0);
            if tx.expiry_unix_seconds > now_unix_seconds {
                out.push(tx);
            }
        }

        while out.len() < max {
            let Some(tx) = self.fifo.pop_front() else { break };
            if tx.expiry_unix_seconds > now_unix_seconds {
                out.push(tx);
            }
        }

        out
    }

    /// Return a transaction to the front of the FIFO queue (e.g. a
    /// rejected-at-settlement batch's members, to be retried).
    pub fn requeue_front(&mut self, tx: Transaction) {
        self.fifo.push_front(tx);
    }

    /// Snapshot both queues in their current order, for checkpointing.
    pub fn snapshot(&self) -> (Vec<Transaction>, Vec<(u8, Transaction)>) {
        (self.fifo.iter().cloned().collect(), self.priority.clone())
    }

    /// Replace both queues wholesale, e.g. when restoring from a checkpoint.
    pub fn restore(&mut self, fifo: Vec<Transaction>, priority: Vec<(u8, Transaction)>) {
        self.fifo = fifo.into();
        self.priority = priority;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollup_types::{Address, Hash, TxId, TxStatus, TxType};

    fn tx(nonce: u64, expiry: u64) -> Transaction {
        let base = Transaction {
            id: TxId::from(Hash::ZERO),
            sender: Address::new([1u8; 32]),
            recipient: Address::new([2u8; 32]),
            amount: 1,
            nonce,
            expiry_unix_seconds: expiry,
            tx_type: TxType::Transfer,
            status: TxStatus::Pending,
            data: vec![],
            signature: vec![],
        };
        Transaction { id: base.compute_id(), ..base }
    }

    #[test]
    fn priority_drains_before_fifo() {
        let mut q = Queues::new();
        q.push_fifo(tx(0, 10_000));
        q.push_priority(tx(1, 10_000), 5);
        let drained = q.drain_batch(10, 0);
        assert_eq!(drained[0].nonce, 1);
        assert_eq!(drained[1].nonce, 0);
    }

    #[test]
    fn higher_priority_drains_first() {
        let mut q = Queues::new();
        q.push_priority(tx(1, 10_000), 2);
        q.push_priority(tx(2, 10_000), 8);
        let drained = q.drain_batch(10, 0);
        assert_eq!(drained[0].nonce, 2);
        assert_eq!(drained[1].nonce, 1);
    }

    #[test]
    fn expired_transactions_are_skipped_and_dropped() {
        let mut q = Queues::new();
        q.push_fifo(tx(0, 5));
        q.push_fifo(tx(1, 10_000));
        let drained = q.drain_batch(10, 100);
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].nonce, 1);
        assert_eq!(q.fifo_len(), 0, "the expired tx was dropped, not retained");
    }

    #[test]
    fn drain_respects_max_batch_size() {
        let mut q = Queues::new();
        for i in 0..5 {
            q.push_fifo(tx(i, 10_000));
        }
        let drained = q.drain_batch(3, 0);
        assert_eq!(drained.len(), 3);
        assert_eq!(q.fifo_len(), 2);
    }
}
