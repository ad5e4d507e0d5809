//! Wire types shared across the rollup core: hashes, identifiers,
//! transactions, batches, Merkle proofs, signing message construction, and
//! the fixed wire encoding used for batch submission.

mod batch;
mod hash;
mod identifiers;
mod merkle;
mod state;
mod transaction;
pub mod wire;

pub mod signing;

pub use batch::Batch;
pub use hash::{Hash, HexError};
pub use identifiers::{Address, BatchId, ShardId, TxId};
pub use merkle::{build_merkle_tree_with_proofs, MerkleProof};
pub use state::StateRecord;
pub use transaction::{Transaction, TxStatus, TxType};
