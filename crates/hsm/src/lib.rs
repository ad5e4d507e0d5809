//! Vendor-agnostic HSM contract and the `HsmBoundKey` lifecycle that pairs
//! an HSM-resident master key with a TSS-shared public key.

mod backup;
mod lifecycle;
mod provider;
mod soft_hsm;

pub use backup::{decrypt, encrypt};
pub use lifecycle::{HsmBoundKey, LifecycleState};
pub use provider::{BackupBlob, HsmError, HsmProvider, KeyAttributes, KeyType, KeyUsage};
pub use soft_hsm::SoftHsm;
