//! Consistent-hash shard routing with virtual nodes.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

/// A shard's ordinal position. Stable across ring rebuilds as long as the
/// shard count doesn't change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShardId(pub u32);

fn hash_to_u64(input: &str) -> u64 {
    let digest = Sha256::digest(input.as_bytes());
    u64::from_be_bytes(digest[0..8].try_into().unwrap())
}

/// Maps keys to shards via a hash ring with `virtual_nodes_per_shard` points
/// per shard, so adding or removing a shard only reshuffles a fraction of
/// the keyspace rather than everything.
#[derive(Clone, Debug)]
pub struct ConsistentHashRing {
    ring: BTreeMap<u64, ShardId>,
    shard_count: u32,
    virtual_nodes_per_shard: u32,
}

impl ConsistentHashRing {
    pub fn new(shard_count: u32, virtual_nodes_per_shard: u32) -> Self {
        let mut ring = BTreeMap::new();
        for shard in 0..shard_count {
            for vnode in 0..virtual_nodes_per_shard {
                let point = hash_to_u64(&format!("shard-{shard}-vnode-{vnode}"));
                ring.insert(point, ShardId(shard));
            }
        }
        Self {
            ring,
            shard_count,
            virtual_nodes_per_shard,
        }
    }

    /// Default topology: 16 shards, 100 virtual nodes each.
    pub fn default_topology() -> Self {
        Self::new(16, 100)
    }

    pub fn shard_count(&self) -> u32 {
        self.shard_count
    }

    /// Which shard owns `key`: the first ring point at or after `hash(key)`,
    /// wrapping around to the smallest point if `key` hashes past the end.
    pub fn route(&self, key: &str) -> ShardId {
        let point = hash_to_u64(key);
        self.ring
            .range(point..)
            .next()
            .or_else(|| self.ring.iter().next())
            .map(|(_, shard)| *shard)
            .expect("ring is never empty when shard_count > 0")
    }

    /// The primary shard plus up to `replicas - 1` distinct follow-on shards
    /// for replication, walking the ring clockwise from the primary.
    pub fn replicas_for(&self, key: &str, replicas: usize) -> Vec<ShardId> {
        let primary = self.route(key);
        let mut out = vec![primary];
        if self.shard_count == 0 {
            return out;
        }
        let mut next = primary.0;
        while out.len() < replicas && out.len() < self.shard_count as usize {
            next = (next + 1) % self.shard_count;
            out.push(ShardId(next));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_is_deterministic() {
        let ring = ConsistentHashRing::new(8, 32);
        assert_eq!(ring.route("tx-1"), ring.route("tx-1"));
    }

    #[test]
    fn keys_spread_across_shards() {
        let ring = ConsistentHashRing::new(8, 100);
        let mut seen = std::collections::HashSet::new();
        for i in 0..200 {
            seen.insert(ring.route(&format!("key-{i}")));
        }
        assert!(seen.len() > 1, "200 keys should not all collide on one shard");
    }

    #[test]
    fn replicas_for_are_distinct_and_sized() {
        let ring = ConsistentHashRing::new(8, 32);
        let replicas = ring.replicas_for("tx-1", 3);
        assert_eq!(replicas.len(), 3);
        let unique: std::collections::HashSet<_> = replicas.iter().collect();
        assert_eq!(unique.len(), 3);
    }

    #[test]
    fn replicas_for_caps_at_shard_count() {
        let ring = ConsistentHashRing::new(2, 4);
        let replicas = ring.replicas_for("tx-1", 5);
        assert_eq!(replicas.len(), 2);
    }

    #[test]
    fn adding_a_shard_only_moves_a_fraction_of_keys() {
        let before = ConsistentHashRing::new(8, 100);
        let after = ConsistentHashRing::new(9, 100);
        let keys: Vec<String> = (0..500).map(|i| format!("key-{i}")).collect();
        let moved = keys
            .iter()
            .filter(|k| before.route(k) != after.route(k))
            .count();
        // With 8->9 shards roughly 1/9th of keys should move; allow generous
        // slack since virtual-node placement is random-looking but fixed.
        assert!(moved < keys.len() / 2, "moved {moved} of {}", keys.len());
    }
}
