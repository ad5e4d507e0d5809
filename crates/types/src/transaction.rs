//! Transaction entity and its canonical encoding.

use crate::identifiers::{Address, TxId};
use crate::Hash;
use serde::{Deserialize, Serialize};

/// One-of transaction kinds.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[repr(u8)]
pub enum TxType {
    /// Funds entering the rollup from the settlement layer.
    Deposit = 0,
    /// An intra-rollup transfer. The default when unspecified.
    Transfer = 1,
    /// Funds leaving the rollup back to the settlement layer.
    Withdrawal = 2,
    /// Anything else, distinguished only by its opaque `data` payload.
    Other = 3,
}

impl TxType {
    /// Decode from the wire byte tag.
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Deposit),
            1 => Some(Self::Transfer),
            2 => Some(Self::Withdrawal),
            3 => Some(Self::Other),
            _ => None,
        }
    }
}

impl Default for TxType {
    fn default() -> Self {
        Self::Transfer
    }
}

/// Status a transaction can occupy. Transitions form a DAG:
/// `Pending -> {Confirmed, Rejected, Challenged}`, `Challenged -> {Confirmed, Rejected}`.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[repr(u8)]
pub enum TxStatus {
    /// Accepted by the sequencer, not yet included in a submitted batch.
    Pending = 0,
    /// Included in a batch that the settlement layer confirmed.
    Confirmed = 1,
    /// Finally rejected; will never be retried.
    Rejected = 2,
    /// Under dispute; resolves to Confirmed or Rejected.
    Challenged = 3,
}

impl TxStatus {
    /// Decode from the wire byte tag.
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Pending),
            1 => Some(Self::Confirmed),
            2 => Some(Self::Rejected),
            3 => Some(Self::Challenged),
            _ => None,
        }
    }

    /// Whether transitioning to `next` is permitted.
    pub fn can_transition_to(self, next: TxStatus) -> bool {
        use TxStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed) | (Pending, Rejected) | (Pending, Challenged)
                | (Challenged, Confirmed) | (Challenged, Rejected)
        )
    }
}

/// A rollup transaction.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Transaction {
    /// SHA-256 of the canonical encoding of the fields below `id`.
    pub id: TxId,
    pub sender: Address,
    pub recipient: Address,
    pub amount: u64,
    pub nonce: u64,
    pub expiry_unix_seconds: u64,
    pub tx_type: TxType,
    pub status: TxStatus,
    pub data: Vec<u8>,
    /// Detached signature bytes; empty if unsigned.
    pub signature: Vec<u8>,
}

impl Transaction {
    /// Canonical byte encoding used to derive `id` and the Merkle leaf hash.
    /// Field order matches the wire format: everything but `id` itself,
    /// in the order sender, recipient, amount, nonce, expiry, type, status,
    /// data, signature.
    pub fn canonical_encoding(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(32 + 32 + 8 + 8 + 8 + 1 + 1 + 4 + self.data.len() + 4 + self.signature.len());
        out.extend_from_slice(self.sender.as_bytes());
        out.extend_from_slice(self.recipient.as_bytes());
        out.extend_from_slice(&self.amount.to_le_bytes());
        out.extend_from_slice(&self.nonce.to_le_bytes());
        out.extend_from_slice(&self.expiry_unix_seconds.to_le_bytes());
        out.push(self.tx_type as u8);
        out.push(self.status as u8);
        out.extend_from_slice(&(self.data.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.data);
        out.extend_from_slice(&(self.signature.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.signature);
        out
    }

    /// Compute the `id` that should be assigned to this transaction: the
    /// SHA-256 of its canonical encoding.
    pub fn compute_id(&self) -> TxId {
        TxId::from(Hash::from_bytes(&self.canonical_encoding()))
    }

    /// The bytes a detached signature is computed over: the canonical
    /// encoding without the trailing signature field (a signature can't
    /// cover itself).
    pub fn signing_payload(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(32 + 32 + 8 + 8 + 8 + 1 + 1 + 4 + self.data.len());
        out.extend_from_slice(self.sender.as_bytes());
        out.extend_from_slice(self.recipient.as_bytes());
        out.extend_from_slice(&self.amount.to_le_bytes());
        out.extend_from_slice(&self.nonce.to_le_bytes());
        out.extend_from_slice(&self.expiry_unix_seconds.to_le_bytes());
        out.push(self.tx_type as u8);
        out.push(self.status as u8);
        out.extend_from_slice(&(self.data.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.data);
        out
    }

    /// Merkle leaf hash for this transaction: SHA-256 of the canonical
    /// encoding (same as `compute_id` — the `id` field is itself the leaf).
    pub fn leaf_hash(&self) -> Hash {
        self.compute_id().hash()
    }
}
