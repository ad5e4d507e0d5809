//! Newtype wrappers over raw identifiers used throughout the core.

use crate::Hash;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro for declaring a `Hash`-backed newtype identifier.
macro_rules! hash_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Hash);

        impl $name {
            /// Wrap a raw hash as this identifier.
            pub fn new(hash: Hash) -> Self {
                Self(hash)
            }

            /// Access the underlying hash.
            pub fn hash(&self) -> Hash {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:?})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Hash> for $name {
            fn from(hash: Hash) -> Self {
                Self(hash)
            }
        }
    };
}

hash_id!(TxId, "Unique identifier of a Transaction (SHA-256 of its canonical encoding).");
hash_id!(BatchId, "Unique identifier of a Batch.");

/// A 32-byte account address (sender or recipient).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address([u8; 32]);

impl Address {
    /// Construct an address from raw bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Access the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// An address is well-formed if it is non-zero.
    ///
    /// The zero address is reserved and can never be a valid sender or
    /// recipient.
    pub fn is_well_formed(&self) -> bool {
        self.0.iter().any(|&b| b != 0)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", hex::encode(self.0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// A per-shard identifier, 0-based.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct ShardId(pub u32);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_address_is_not_well_formed() {
        assert!(!Address::new([0u8; 32]).is_well_formed());
    }

    #[test]
    fn nonzero_address_is_well_formed() {
        let mut bytes = [0u8; 32];
        bytes[0] = 1;
        assert!(Address::new(bytes).is_well_formed());
    }

    #[test]
    fn tx_id_display_matches_hash_hex() {
        let h = Hash::from_bytes(b"tx");
        let id = TxId::from(h);
        assert_eq!(id.to_string(), h.to_hex());
    }
}
