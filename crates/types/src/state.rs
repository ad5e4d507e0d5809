//! Key-value state record stored by the ShardedStore.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single versioned key-value record.
///
/// Replaced only by a write whose `version` strictly exceeds the stored
/// one; writes with an equal or lower version are no-ops (spec invariant 5).
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct StateRecord {
    pub key: String,
    pub value: Value,
    pub version: u64,
    pub updated_at_unix_seconds: u64,
}

impl StateRecord {
    /// Whether `incoming` should replace `self` under the version rule.
    pub fn should_replace_with(&self, incoming: &StateRecord) -> bool {
        incoming.version > self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(version: u64) -> StateRecord {
        StateRecord {
            key: "k".into(),
            value: Value::Null,
            version,
            updated_at_unix_seconds: 0,
        }
    }

    #[test]
    fn higher_version_replaces() {
        assert!(record(1).should_replace_with(&record(2)));
    }

    #[test]
    fn equal_version_does_not_replace() {
        assert!(!record(2).should_replace_with(&record(2)));
    }

    #[test]
    fn lower_version_does_not_replace() {
        assert!(!record(2).should_replace_with(&record(1)));
    }
}
