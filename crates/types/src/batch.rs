//! Batch entity: an ordered group of transactions summarised by a Merkle
//! root and a combined TSS+HSM signature.

use crate::identifiers::BatchId;
use crate::identifiers::TxId;
use crate::Hash;
use serde::{Deserialize, Serialize};

/// An ordered group of transactions committed to the settlement layer as a
/// single unit.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Batch {
    pub id: BatchId,
    /// Transaction ids in inclusion order (priority tier first, then FIFO).
    pub txs: Vec<TxId>,
    pub root: Hash,
    /// 32-byte sequencer public key (secp256k1, compressed, truncated is
    /// not permitted — this is the x-coordinate-only commitment used on the
    /// wire; see `crate::signing`).
    pub sequencer_pk: [u8; 32],
    pub timestamp: u64,
    pub expiry_unix_seconds: u64,
    /// `HSM_sig ':' r ':' s`, populated once both signing legs complete.
    pub signature: Option<String>,
}

impl Batch {
    /// Construct an unsigned batch header immediately after assembly.
    pub fn new_unsigned(
        txs: Vec<TxId>,
        root: Hash,
        sequencer_pk: [u8; 32],
        timestamp: u64,
        expiry_unix_seconds: u64,
        batch_counter: u64,
        nonce_bytes: [u8; 16],
    ) -> Self {
        let id = Hash::from_parts(&[
            &sequencer_pk,
            &timestamp.to_le_bytes(),
            &batch_counter.to_le_bytes(),
            &nonce_bytes,
        ]);
        Self {
            id: BatchId::from(id),
            txs,
            root,
            sequencer_pk,
            timestamp,
            expiry_unix_seconds,
            signature: None,
        }
    }

    /// Whether both signing legs have been attached.
    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    /// Assemble the combined `signature` field from the HSM leg and the
    /// combined TSS (r, s) pair.
    pub fn attach_signature(&mut self, hsm_sig_hex: &str, r_hex: &str, s_hex: &str) {
        self.signature = Some(format!("{hsm_sig_hex}:{r_hex}:{s_hex}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsigned_batch_has_no_signature() {
        let batch = Batch::new_unsigned(vec![], Hash::ZERO, [0u8; 32], 1, 2, 0, [0u8; 16]);
        assert!(!batch.is_signed());
    }

    #[test]
    fn attaching_signature_marks_batch_signed() {
        let mut batch = Batch::new_unsigned(vec![], Hash::ZERO, [0u8; 32], 1, 2, 0, [0u8; 16]);
        batch.attach_signature("aa", "bb", "cc");
        assert!(batch.is_signed());
        assert_eq!(batch.signature.as_deref(), Some("aa:bb:cc"));
    }

    #[test]
    fn id_depends_on_nonce_bytes() {
        let a = Batch::new_unsigned(vec![], Hash::ZERO, [0u8; 32], 1, 2, 0, [1u8; 16]);
        let b = Batch::new_unsigned(vec![], Hash::ZERO, [0u8; 32], 1, 2, 0, [2u8; 16]);
        assert_ne!(a.id, b.id);
    }
}
