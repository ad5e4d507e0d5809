//! Deterministic batch assembly from a drained set of transactions.

use rollup_types::{build_merkle_tree_with_proofs, Batch, Transaction};

/// Build a `Batch` header over `txs` (already drained in inclusion order).
/// `nonce_bytes` seeds batch id uniqueness alongside `batch_counter`.
pub fn assemble(
    txs: &[Transaction],
    sequencer_pk: [u8; 32],
    timestamp: u64,
    expiry_unix_seconds: u64,
    batch_counter: u64,
    nonce_bytes: [u8; 16],
) -> Batch {
    let leaves: Vec<_> = txs.iter().map(|tx| tx.leaf_hash()).collect();
    let root = if leaves.is_empty() {
        rollup_types::Hash::ZERO
    } else {
        build_merkle_tree_with_proofs(&leaves).0
    };
    let tx_ids = txs.iter().map(|tx| tx.id).collect();
    Batch::new_unsigned(tx_ids, root, sequencer_pk, timestamp, expiry_unix_seconds, batch_counter, nonce_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollup_types::{Address, Hash, TxId, TxStatus, TxType};

    fn tx(nonce: u64) -> Transaction {
        let base = Transaction {
            id: TxId::from(Hash::ZERO),
            sender: Address::new([1u8; 32]),
            recipient: Address::new([2u8; 32]),
            amount: 1,
            nonce,
            expiry_unix_seconds: 10_000,
            tx_type: TxType::Transfer,
            status: TxStatus::Pending,
            data: vec![],
            signature: vec![],
        };
        Transaction { id: base.compute_id(), ..base }
    }

    #[test]
    fn root_is_recomputable_from_contents_alone() {
        let txs = vec![tx(0), tx(1), tx(2)];
        let batch = assemble(&txs, [7u8; 32], 1000, 2000, 0, [0u8; 16]);
        let leaves: Vec<_> = txs.iter().map(|t| t.leaf_hash()).collect();
        let (expected_root, _) = build_merkle_tree_with_proofs(&leaves);
        assert_eq!(batch.root, expected_root);
    }

    #[test]
    fn batch_preserves_inclusion_order() {
        let txs = vec![tx(0), tx(1)];
        let batch = assemble(&txs, [7u8; 32], 1000, 2000, 0, [0u8; 16]);
        assert_eq!(batch.txs, vec![txs[0].id, txs[1].id]);
    }

    #[test]
    fn empty_batch_has_zero_root() {
        let batch = assemble(&[], [7u8; 32], 1000, 2000, 0, [0u8; 16]);
        assert_eq!(batch.root, Hash::ZERO);
    }
}
