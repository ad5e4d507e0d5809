//! Three-tier LRU cache with adaptive compression and dependency-based
//! invalidation (Component D).
//!
//! Compression chooses among the algorithms actually available rather than
//! the full deflate/gzip/brotli set: only `lz4_flex` (already in the
//! aligned dependency stack) is wired up, memoised per key the same way a
//! multi-algorithm chooser would be once more than one candidate exists.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use parking_lot::Mutex;

/// Which of the three tiers an entry currently resides in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tier {
    L1,
    L2,
    L3,
}

impl Tier {
    fn up(self) -> Self {
        match self {
            Tier::L1 => Tier::L2,
            Tier::L2 => Tier::L3,
            Tier::L3 => Tier::L3,
        }
    }

    fn down(self) -> Self {
        match self {
            Tier::L1 => Tier::L1,
            Tier::L2 => Tier::L1,
            Tier::L3 => Tier::L2,
        }
    }
}

/// How a stored value was compressed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompressionTag {
    None,
    Lz4,
}

#[derive(Clone, Debug)]
struct CacheEntry {
    value: Vec<u8>,
    compression: CompressionTag,
    access_count: u32,
    last_access: Instant,
}

/// Tunables for the cache. Tier capacities and TTLs are derived from
/// `base_capacity`/`base_ttl` using the fixed ratios in spec §4.D.
#[derive(Clone, Debug)]
pub struct CacheConfig {
    pub base_capacity: usize,
    pub base_ttl: Duration,
    pub shard_count: usize,
    pub compression_threshold: usize,
    pub promotion_threshold: u32,
    pub demotion_threshold: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            base_capacity: 10_000,
            base_ttl: Duration::from_secs(300),
            shard_count: 16,
            compression_threshold: 1024,
            promotion_threshold: 3,
            demotion_threshold: Duration::from_secs(120),
        }
    }
}

struct TierSpec {
    capacity: usize,
    ttl: Duration,
}

impl CacheConfig {
    fn tier_spec(&self, tier: Tier) -> TierSpec {
        let (cap_pct, ttl_pct) = match tier {
            Tier::L1 => (0.20, 0.25),
            Tier::L2 => (0.30, 0.50),
            Tier::L3 => (0.50, 1.00),
        };
        TierSpec {
            capacity: ((self.base_capacity as f64 * cap_pct) as usize).max(1),
            ttl: Duration::from_secs_f64(self.base_ttl.as_secs_f64() * ttl_pct),
        }
    }

    fn shard_count(&self) -> usize {
        self.shard_count.min(64).max(1)
    }
}

fn shard_index(key: &str, shard_count: usize) -> usize {
    // Deterministic, non-cryptographic dispersion — good enough to spread
    // keys across shards without pulling in an MD5 implementation.
    let mut h: u64 = 1469598103934665603; // FNV-1a offset basis
    for b in key.as_bytes() {
        h ^= *b as u64;
        h = h.wrapping_mul(1099511628211);
    }
    (h as usize) % shard_count
}

struct Shard {
    l1: IndexMap<String, CacheEntry>,
    l2: IndexMap<String, CacheEntry>,
    l3: IndexMap<String, CacheEntry>,
}

impl Shard {
    fn new() -> Self {
        Self {
            l1: IndexMap::new(),
            l2: IndexMap::new(),
            l3: IndexMap::new(),
        }
    }

    fn tier_map(&mut self, tier: Tier) -> &mut IndexMap<String, CacheEntry> {
        match tier {
            Tier::L1 => &mut self.l1,
            Tier::L2 => &mut self.l2,
            Tier::L3 => &mut self.l3,
        }
    }

    fn find(&self, key: &str) -> Option<Tier> {
        if self.l1.contains_key(key) {
            Some(Tier::L1)
        } else if self.l2.contains_key(key) {
            Some(Tier::L2)
        } else if self.l3.contains_key(key) {
            Some(Tier::L3)
        } else {
            None
        }
    }

    fn remove_from_any(&mut self, key: &str) -> Option<(Tier, CacheEntry)> {
        if let Some(e) = self.l1.shift_remove(key) {
            return Some((Tier::L1, e));
        }
        if let Some(e) = self.l2.shift_remove(key) {
            return Some((Tier::L2, e));
        }
        if let Some(e) = self.l3.shift_remove(key) {
            return Some((Tier::L3, e));
        }
        None
    }

    fn evict_if_over_capacity(&mut self, tier: Tier, capacity: usize) {
        let map = self.tier_map(tier);
        while map.len() > capacity {
            map.shift_remove_index(0);
        }
    }
}

/// Result of a `set`/`get` call that hit a compression error: degrades to a
/// cache miss rather than surfacing an exception.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheWarning {
    CompressionFailed { key: String },
    DecompressionFailed { key: String },
    UnknownCompressionTag { key: String },
}

/// Running counters for the metrics endpoint: hits per tier, misses, and
/// the bytes seen by the compressor before/after, for a hit-rate-by-tier
/// and a compression-ratio gauge.
#[derive(Default)]
struct Counters {
    hits_l1: AtomicU64,
    hits_l2: AtomicU64,
    hits_l3: AtomicU64,
    misses: AtomicU64,
    raw_bytes: AtomicU64,
    stored_bytes: AtomicU64,
}

/// Point-in-time read of [`Counters`], returned by `MultiLevelCache::stats`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheStats {
    pub hits_l1: u64,
    pub hits_l2: u64,
    pub hits_l3: u64,
    pub misses: u64,
    /// `stored_bytes / raw_bytes`; `1.0` if nothing has been cached yet.
    pub compression_ratio: f64,
}

/// The three-tier cache.
pub struct MultiLevelCache {
    config: CacheConfig,
    shards: Vec<Mutex<Shard>>,
    dependents: Mutex<HashMap<String, HashSet<String>>>,
    tags: Mutex<HashMap<String, HashSet<String>>>,
    counters: Counters,
}

impl MultiLevelCache {
    pub fn new(config: CacheConfig) -> Self {
        let shard_count = config.shard_count();
        Self {
            shards: (0..shard_count).map(|_| Mutex::new(Shard::new())).collect(),
            dependents: Mutex::new(HashMap::new()),
            tags: Mutex::new(HashMap::new()),
            counters: Counters::default(),
            config,
        }
    }

    /// Snapshot of hit/miss counters and compression ratio since construction.
    pub fn stats(&self) -> CacheStats {
        let raw = self.counters.raw_bytes.load(Ordering::Relaxed);
        let stored = self.counters.stored_bytes.load(Ordering::Relaxed);
        CacheStats {
            hits_l1: self.counters.hits_l1.load(Ordering::Relaxed),
            hits_l2: self.counters.hits_l2.load(Ordering::Relaxed),
            hits_l3: self.counters.hits_l3.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            compression_ratio: if raw == 0 { 1.0 } else { stored as f64 / raw as f64 },
        }
    }

    fn shard_for(&self, key: &str) -> &Mutex<Shard> {
        &self.shards[shard_index(key, self.shards.len())]
    }

    fn compress(&self, raw: &[u8]) -> (Vec<u8>, CompressionTag) {
        self.counters.raw_bytes.fetch_add(raw.len() as u64, Ordering::Relaxed);
        let (stored, tag) = if raw.len() <= self.config.compression_threshold {
            (raw.to_vec(), CompressionTag::None)
        } else {
            let compressed = lz4_flex::compress_prepend_size(raw);
            if compressed.len() < raw.len() {
                (compressed, CompressionTag::Lz4)
            } else {
                (raw.to_vec(), CompressionTag::None)
            }
        };
        self.counters.stored_bytes.fetch_add(stored.len() as u64, Ordering::Relaxed);
        (stored, tag)
    }

    fn decompress(&self, entry: &CacheEntry) -> Result<Vec<u8>, ()> {
        match entry.compression {
            CompressionTag::None => Ok(entry.value.clone()),
            CompressionTag::Lz4 => lz4_flex::decompress_size_prepended(&entry.value).map_err(|_| ()),
        }
    }

    /// Insert `value` for `key`, always landing in L1 (matching the
    /// promotion model: new keys start cold).
    pub fn set(&self, key: &str, value: &[u8]) -> Option<CacheWarning> {
        let (stored, tag) = self.compress(value);
        let mut shard = self.shard_for(key).lock();
        shard.remove_from_any(key);
        shard.l1.insert(
            key.to_string(),
            CacheEntry {
                value: stored,
                compression: tag,
                access_count: 0,
                last_access: Instant::now(),
            },
        );
        let cap = self.config.tier_spec(Tier::L1).capacity;
        shard.evict_if_over_capacity(Tier::L1, cap);
        None
    }

    /// Look up `key`, applying TTL expiry and the promotion rule.
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheWarning> {
        let mut shard = self.shard_for(key).lock();
        let Some(tier) = shard.find(key) else {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        };
        match tier {
            Tier::L1 => self.counters.hits_l1.fetch_add(1, Ordering::Relaxed),
            Tier::L2 => self.counters.hits_l2.fetch_add(1, Ordering::Relaxed),
            Tier::L3 => self.counters.hits_l3.fetch_add(1, Ordering::Relaxed),
        };
        let ttl = self.config.tier_spec(tier).ttl;

        let entry = shard.tier_map(tier).get(key).unwrap().clone();
        if entry.last_access.elapsed() > ttl {
            shard.remove_from_any(key);
            return Ok(None);
        }

        let decompressed = match self.decompress(&entry) {
            Ok(d) => d,
            Err(()) => {
                shard.remove_from_any(key);
                return Err(CacheWarning::DecompressionFailed { key: key.to_string() });
            }
        };

        // Bump access bookkeeping and possibly promote.
        let new_count = entry.access_count + 1;
        let promote = new_count >= self.config.promotion_threshold && tier != Tier::L3;
        let target_tier = if promote { tier.up() } else { tier };

        let mut updated = entry.clone();
        updated.access_count = if promote { 0 } else { new_count };
        updated.last_access = Instant::now();

        shard.tier_map(tier).shift_remove(key);
        let cap = self.config.tier_spec(target_tier).capacity;
        shard.tier_map(target_tier).insert(key.to_string(), updated);
        shard.evict_if_over_capacity(target_tier, cap);

        Ok(Some(decompressed))
    }

    /// Move any entry whose idle time exceeds its tier's demotion rule down
    /// one tier. Intended to be called periodically by the runner.
    pub fn sweep_demotions(&self) {
        for shard_lock in &self.shards {
            let mut shard = shard_lock.lock();
            for tier in [Tier::L3, Tier::L2] {
                let stale: Vec<String> = shard
                    .tier_map(tier)
                    .iter()
                    .filter(|(_, e)| e.last_access.elapsed() > self.config.demotion_threshold)
                    .map(|(k, _)| k.clone())
                    .collect();
                for key in stale {
                    if let Some(mut entry) = shard.tier_map(tier).shift_remove(&key) {
                        entry.access_count = 0;
                        let target = tier.down();
                        let cap = self.config.tier_spec(target).capacity;
                        shard.tier_map(target).insert(key, entry);
                        shard.evict_if_over_capacity(target, cap);
                    }
                }
            }
        }
    }

    /// Register that invalidating `key` must cascade to `dep`. Rejects the
    /// edge if it would create a cycle.
    pub fn add_dependency(&self, key: &str, dep: &str) -> Result<(), DependencyCycle> {
        let mut graph = self.dependents.lock();
        if would_create_cycle(&graph, key, dep) {
            return Err(DependencyCycle);
        }
        graph.entry(key.to_string()).or_default().insert(dep.to_string());
        Ok(())
    }

    /// Tag `key` under `tag` for bulk invalidation via `invalidate_by_tag`.
    pub fn tag(&self, key: &str, tag: &str) {
        self.tags.lock().entry(tag.to_string()).or_default().insert(key.to_string());
    }

    /// Remove `key` and cascade to everything transitively dependent on it.
    pub fn invalidate(&self, key: &str) {
        let mut visited = HashSet::new();
        let mut stack = vec![key.to_string()];
        while let Some(k) = stack.pop() {
            if !visited.insert(k.clone()) {
                continue;
            }
            self.shard_for(&k).lock().remove_from_any(&k);
            if let Some(deps) = self.dependents.lock().get(&k) {
                stack.extend(deps.iter().cloned());
            }
        }
    }

    /// Invalidate every key registered under `tag`.
    pub fn invalidate_by_tag(&self, tag: &str) {
        let keys: Vec<String> = self.tags.lock().get(tag).cloned().unwrap_or_default().into_iter().collect();
        for key in keys {
            self.invalidate(&key);
        }
    }

    /// Which tier (if any) `key` currently resides in.
    pub fn tier_of(&self, key: &str) -> Option<Tier> {
        self.shard_for(key).lock().find(key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("adding this dependency would create a cycle")]
pub struct DependencyCycle;

fn would_create_cycle(graph: &HashMap<String, HashSet<String>>, key: &str, dep: &str) -> bool {
    if key == dep {
        return true;
    }
    // Would `dep` (transitively) depend back on `key`?
    let mut stack = vec![dep.to_string()];
    let mut visited = HashSet::new();
    while let Some(node) = stack.pop() {
        if node == key {
            return true;
        }
        if !visited.insert(node.clone()) {
            continue;
        }
        if let Some(children) = graph.get(&node) {
            stack.extend(children.iter().cloned());
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_cache() -> MultiLevelCache {
        MultiLevelCache::new(CacheConfig {
            base_capacity: 100,
            base_ttl: Duration::from_secs(3600),
            shard_count: 4,
            compression_threshold: 8,
            promotion_threshold: 3,
            demotion_threshold: Duration::from_millis(10),
        })
    }

    #[test]
    fn set_then_get_round_trips() {
        let c = small_cache();
        c.set("k", b"value");
        assert_eq!(c.get("k").unwrap(), Some(b"value".to_vec()));
    }

    #[test]
    fn new_key_starts_in_l1() {
        let c = small_cache();
        c.set("k", b"v");
        assert_eq!(c.tier_of("k"), Some(Tier::L1));
    }

    #[test]
    fn promotion_after_threshold_hits() {
        let c = small_cache();
        c.set("k", b"v");
        c.get("k").unwrap();
        c.get("k").unwrap();
        assert_eq!(c.tier_of("k"), Some(Tier::L1), "2 hits, below threshold 3");
        c.get("k").unwrap();
        assert_eq!(c.tier_of("k"), Some(Tier::L2), "3rd hit promotes to L2");
    }

    #[test]
    fn exclusivity_key_is_in_exactly_one_tier() {
        let c = small_cache();
        c.set("k", b"v");
        for _ in 0..3 {
            c.get("k").unwrap();
        }
        let mut count = 0;
        for shard in &c.shards {
            let s = shard.lock();
            if s.l1.contains_key("k") { count += 1; }
            if s.l2.contains_key("k") { count += 1; }
            if s.l3.contains_key("k") { count += 1; }
        }
        assert_eq!(count, 1);
    }

    #[test]
    fn demotion_after_idle_moves_down_one_tier() {
        let c = small_cache();
        c.set("k", b"v");
        for _ in 0..3 {
            c.get("k").unwrap();
        }
        assert_eq!(c.tier_of("k"), Some(Tier::L2));
        std::thread::sleep(Duration::from_millis(20));
        c.sweep_demotions();
        assert_eq!(c.tier_of("k"), Some(Tier::L1));
    }

    #[test]
    fn large_value_is_compressed() {
        let c = small_cache();
        let big = vec![7u8; 4096];
        c.set("k", &big);
        assert_eq!(c.get("k").unwrap(), Some(big));
    }

    #[test]
    fn cyclic_dependency_is_rejected() {
        let c = small_cache();
        c.add_dependency("a", "b").unwrap();
        c.add_dependency("b", "c").unwrap();
        assert!(c.add_dependency("c", "a").is_err());
    }

    #[test]
    fn invalidate_cascades_to_dependents() {
        let c = small_cache();
        c.set("a", b"1");
        c.set("b", b"2");
        c.add_dependency("a", "b").unwrap();
        c.invalidate("a");
        assert_eq!(c.get("a").unwrap(), None);
        assert_eq!(c.get("b").unwrap(), None);
    }

    #[test]
    fn invalidate_by_tag_clears_all_tagged_keys() {
        let c = small_cache();
        c.set("x", b"1");
        c.set("y", b"2");
        c.tag("x", "group");
        c.tag("y", "group");
        c.invalidate_by_tag("group");
        assert_eq!(c.get("x").unwrap(), None);
        assert_eq!(c.get("y").unwrap(), None);
    }

    #[test]
    fn stats_track_hits_by_tier_and_misses() {
        let c = small_cache();
        c.set("k", b"v");
        c.get("missing").unwrap();
        c.get("k").unwrap();
        let stats = c.stats();
        assert_eq!(stats.hits_l1, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn expired_entry_is_a_miss() {
        let c = MultiLevelCache::new(CacheConfig {
            base_capacity: 100,
            base_ttl: Duration::from_millis(5),
            shard_count: 1,
            compression_threshold: 1024,
            promotion_threshold: 3,
            demotion_threshold: Duration::from_secs(60),
        });
        c.set("k", b"v");
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(c.get("k").unwrap(), None);
    }
}
