//! Pluggable shard routing strategies. Consistent-hash-with-virtual-nodes is
//! the fully worked out default; the rest are represented faithfully but
//! simply, since nothing downstream exercises them beyond routing a key to
//! a shard.

use std::collections::HashMap;

use crate::ring::{ConsistentHashRing, ShardId};

/// Extra routing inputs a strategy may need beyond the bare key.
#[derive(Clone, Debug, Default)]
pub struct RoutingContext {
    pub timestamp_unix_seconds: Option<u64>,
    pub region: Option<String>,
}

pub enum ShardingStrategy {
    /// Consistent hash ring with virtual nodes. The default.
    ConsistentHash(ConsistentHashRing),
    /// Plain `hash(key) % shard_count`. Cheap, but every shard-count change
    /// reshuffles the whole keyspace.
    Hash { shard_count: u32 },
    /// Ordered key ranges, each owned by one shard. `boundaries` is sorted
    /// ascending by upper bound; a key routes to the first boundary it's
    /// less than or equal to.
    Range { boundaries: Vec<(String, ShardId)> },
    /// Explicit key -> shard table, for cases an operator has pinned by
    /// hand (e.g. hot keys isolated onto their own shard).
    Lookup { table: HashMap<String, ShardId> },
    /// Re-routes through a consistent-hash ring that can be swapped out at
    /// runtime (e.g. during a rebalance). Routing itself is identical to
    /// `ConsistentHash`; the distinction is operational, not algorithmic.
    Dynamic(ConsistentHashRing),
    /// Buckets by wall-clock time, useful for time-series-shaped workloads.
    TimeBased { bucket_seconds: u64, shard_count: u32 },
    /// Routes by declared region, falling back to a default shard.
    Geo {
        region_to_shard: HashMap<String, ShardId>,
        default: ShardId,
    },
    /// Tries each inner strategy in order, taking the first that resolves
    /// via `route_with`. `ConsistentHash`/`Hash`/`Dynamic`/`TimeBased` always
    /// resolve, so only put them last.
    Composite(Vec<ShardingStrategy>),
}

impl ShardingStrategy {
    pub fn route(&self, key: &str, ctx: &RoutingContext) -> Option<ShardId> {
        match self {
            ShardingStrategy::ConsistentHash(ring) | ShardingStrategy::Dynamic(ring) => {
                Some(ring.route(key))
            }
            ShardingStrategy::Hash { shard_count } => {
                if *shard_count == 0 {
                    return None;
                }
                let h = simple_hash(key);
                Some(ShardId(h % shard_count))
            }
            ShardingStrategy::Range { boundaries } => boundaries
                .iter()
                .find(|(bound, _)| key <= bound.as_str())
                .map(|(_, shard)| *shard)
                .or_else(|| boundaries.last().map(|(_, shard)| *shard)),
            ShardingStrategy::Lookup { table } => table.get(key).copied(),
            ShardingStrategy::TimeBased { bucket_seconds, shard_count } => {
                let ts = ctx.timestamp_unix_seconds?;
                if *bucket_seconds == 0 || *shard_count == 0 {
                    return None;
                }
                let bucket = ts / bucket_seconds;
                Some(ShardId((bucket % *shard_count as u64) as u32))
            }
            ShardingStrategy::Geo { region_to_shard, default } => Some(
                ctx.region
                    .as_ref()
                    .and_then(|r| region_to_shard.get(r))
                    .copied()
                    .unwrap_or(*default),
            ),
            ShardingStrategy::Composite(strategies) => {
                strategies.iter().find_map(|s| s.route(key, ctx))
            }
        }
    }
}

fn simple_hash(key: &str) -> u32 {
    let mut h: u32 = 2166136261;
    for b in key.as_bytes() {
        h ^= *b as u32;
        h = h.wrapping_mul(16777619);
    }
    h
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_strategy_is_deterministic_and_in_range() {
        let s = ShardingStrategy::Hash { shard_count: 4 };
        let ctx = RoutingContext::default();
        let shard = s.route("k", &ctx).unwrap();
        assert!(shard.0 < 4);
        assert_eq!(shard, s.route("k", &ctx).unwrap());
    }

    #[test]
    fn range_strategy_picks_first_boundary_at_or_above_key() {
        let s = ShardingStrategy::Range {
            boundaries: vec![
                ("m".to_string(), ShardId(0)),
                ("z".to_string(), ShardId(1)),
            ],
        };
        let ctx = RoutingContext::default();
        assert_eq!(s.route("apple", &ctx), Some(ShardId(0)));
        assert_eq!(s.route("yak", &ctx), Some(ShardId(1)));
    }

    #[test]
    fn lookup_strategy_misses_unknown_keys() {
        let mut table = HashMap::new();
        table.insert("hot-key".to_string(), ShardId(3));
        let s = ShardingStrategy::Lookup { table };
        let ctx = RoutingContext::default();
        assert_eq!(s.route("hot-key", &ctx), Some(ShardId(3)));
        assert_eq!(s.route("cold-key", &ctx), None);
    }

    #[test]
    fn time_based_strategy_requires_timestamp() {
        let s = ShardingStrategy::TimeBased { bucket_seconds: 60, shard_count: 4 };
        assert_eq!(s.route("k", &RoutingContext::default()), None);
        let ctx = RoutingContext { timestamp_unix_seconds: Some(120), region: None };
        assert!(s.route("k", &ctx).is_some());
    }

    #[test]
    fn geo_strategy_falls_back_to_default() {
        let mut region_to_shard = HashMap::new();
        region_to_shard.insert("eu".to_string(), ShardId(1));
        let s = ShardingStrategy::Geo { region_to_shard, default: ShardId(0) };
        let ctx = RoutingContext { timestamp_unix_seconds: None, region: Some("eu".to_string()) };
        assert_eq!(s.route("k", &ctx), Some(ShardId(1)));
        assert_eq!(s.route("k", &RoutingContext::default()), Some(ShardId(0)));
    }

    #[test]
    fn composite_strategy_falls_through_to_first_match() {
        let mut table = HashMap::new();
        table.insert("hot".to_string(), ShardId(9));
        let s = ShardingStrategy::Composite(vec![
            ShardingStrategy::Lookup { table },
            ShardingStrategy::Hash { shard_count: 4 },
        ]);
        let ctx = RoutingContext::default();
        assert_eq!(s.route("hot", &ctx), Some(ShardId(9)));
        assert!(s.route("anything-else", &ctx).unwrap().0 < 4);
    }
}
