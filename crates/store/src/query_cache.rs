//! Bounded, TTL'd cache of query results keyed by a digest of the
//! normalised SQL plus its bound parameters.

use std::time::{Duration, Instant};

use indexmap::IndexMap;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

fn cache_key(sql: &str, params: &[String]) -> String {
    let normalised = sql.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    let mut hasher = Sha256::new();
    hasher.update(normalised.as_bytes());
    for p in params {
        hasher.update(b"\0");
        hasher.update(p.as_bytes());
    }
    hex::encode(hasher.finalize())
}

struct Entry {
    value: String,
    inserted_at: Instant,
}

pub struct QueryCache {
    capacity: usize,
    ttl: Duration,
    entries: Mutex<IndexMap<String, Entry>>,
}

impl QueryCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity,
            ttl,
            entries: Mutex::new(IndexMap::new()),
        }
    }

    pub fn get(&self, sql: &str, params: &[String]) -> Option<String> {
        let key = cache_key(sql, params);
        let mut entries = self.entries.lock();
        let hit = entries.get(&key)?;
        if hit.inserted_at.elapsed() > self.ttl {
            entries.shift_remove(&key);
            return None;
        }
        Some(hit.value.clone())
    }

    pub fn put(&self, sql: &str, params: &[String], value: String) {
        let key = cache_key(sql, params);
        let mut entries = self.entries.lock();
        entries.insert(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
        while entries.len() > self.capacity {
            entries.shift_remove_index(0);
        }
    }

    pub fn invalidate_all(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_hits_on_identical_query_and_params() {
        let cache = QueryCache::new(10, Duration::from_secs(60));
        cache.put("SELECT 1", &["a".to_string()], "result".to_string());
        assert_eq!(cache.get("SELECT 1", &["a".to_string()]), Some("result".to_string()));
    }

    #[test]
    fn cache_misses_on_different_params() {
        let cache = QueryCache::new(10, Duration::from_secs(60));
        cache.put("SELECT 1", &["a".to_string()], "result".to_string());
        assert_eq!(cache.get("SELECT 1", &["b".to_string()]), None);
    }

    #[test]
    fn whitespace_normalisation_is_insensitive_to_formatting() {
        let cache = QueryCache::new(10, Duration::from_secs(60));
        cache.put("SELECT  1   FROM t", &[], "result".to_string());
        assert_eq!(cache.get("select 1 from t", &[]), Some("result".to_string()));
    }

    #[test]
    fn entries_expire_after_ttl() {
        let cache = QueryCache::new(10, Duration::from_millis(5));
        cache.put("SELECT 1", &[], "result".to_string());
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.get("SELECT 1", &[]), None);
    }

    #[test]
    fn capacity_evicts_oldest_entry() {
        let cache = QueryCache::new(2, Duration::from_secs(60));
        cache.put("q1", &[], "1".to_string());
        cache.put("q2", &[], "2".to_string());
        cache.put("q3", &[], "3".to_string());
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("q1", &[]), None);
    }
}
