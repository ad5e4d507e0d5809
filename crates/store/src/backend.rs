//! Per-shard storage backends: an in-memory default used for tests and
//! small deployments, and a Postgres-backed implementation for production.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use rollup_types::StateRecord;

use crate::error::StoreError;

/// A single shard's storage surface. Implementations own their own
/// connection management; the router above just calls these methods.
#[async_trait]
pub trait ShardBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<StateRecord>, StoreError>;

    /// Upsert `record`, honoring the strictly-greater-version replacement
    /// rule. Returns `Ok(false)` (not an error) when the incoming version
    /// is not newer than what's stored.
    async fn put(&self, record: StateRecord) -> Result<bool, StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;

    fn is_healthy(&self) -> bool;
}

/// In-process backend. The default for tests and for any shard not backed
/// by a real database connection.
pub struct InMemoryBackend {
    records: DashMap<String, StateRecord>,
    healthy: AtomicBool,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            healthy: AtomicBool::new(true),
        }
    }

    /// Test hook: force this shard's health flag, to exercise failover.
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ShardBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<StateRecord>, StoreError> {
        if !self.is_healthy() {
            return Err(StoreError::Backend("shard marked unhealthy".to_string()));
        }
        Ok(self.records.get(key).map(|r| r.clone()))
    }

    async fn put(&self, record: StateRecord) -> Result<bool, StoreError> {
        if !self.is_healthy() {
            return Err(StoreError::Backend("shard marked unhealthy".to_string()));
        }
        let should_write = match self.records.get(&record.key) {
            Some(existing) => existing.should_replace_with(&record),
            None => true,
        };
        if should_write {
            self.records.insert(record.key.clone(), record);
        }
        Ok(should_write)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.records.remove(key);
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        if self.is_healthy() {
            Ok(())
        } else {
            Err(StoreError::Backend("shard marked unhealthy".to_string()))
        }
    }

    fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }
}

/// Postgres-backed shard. Uses runtime `sqlx::query` rather than the
/// compile-time `query!` macro, since there's no `DATABASE_URL` available
/// to check queries against at build time in this deployment model.
pub struct PostgresBackend {
    pool: sqlx::PgPool,
    healthy: AtomicBool,
}

impl PostgresBackend {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self {
            pool,
            healthy: AtomicBool::new(true),
        }
    }

    /// `state_records(key text primary key, value jsonb, version bigint,
    /// updated_at bigint)`, matching the persisted-schema shape.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS state_records (
                key TEXT PRIMARY KEY,
                value JSONB NOT NULL,
                version BIGINT NOT NULL,
                updated_at BIGINT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ShardBackend for PostgresBackend {
    async fn get(&self, key: &str) -> Result<Option<StateRecord>, StoreError> {
        let row = sqlx::query_as::<_, (String, serde_json::Value, i64, i64)>(
            "SELECT key, value, version, updated_at FROM state_records WHERE key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(key, value, version, updated_at)| StateRecord {
            key,
            value,
            version: version as u64,
            updated_at_unix_seconds: updated_at as u64,
        }))
    }

    async fn put(&self, record: StateRecord) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "INSERT INTO state_records (key, value, version, updated_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (key) DO UPDATE
               SET value = EXCLUDED.value, version = EXCLUDED.version, updated_at = EXCLUDED.updated_at
               WHERE state_records.version < EXCLUDED.version",
        )
        .bind(&record.key)
        .bind(&record.value)
        .bind(record.version as i64)
        .bind(record.updated_at_unix_seconds as i64)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM state_records WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        self.healthy.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }
}

pub type SharedBackend = Arc<dyn ShardBackend>;

#[cfg(test)]
mod tests {
    use super::*;

    fn record(key: &str, version: u64) -> StateRecord {
        StateRecord {
            key: key.to_string(),
            value: serde_json::json!({"v": version}),
            version,
            updated_at_unix_seconds: 0,
        }
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let backend = InMemoryBackend::new();
        backend.put(record("k", 1)).await.unwrap();
        let got = backend.get("k").await.unwrap().unwrap();
        assert_eq!(got.version, 1);
    }

    #[tokio::test]
    async fn stale_write_is_rejected_silently() {
        let backend = InMemoryBackend::new();
        backend.put(record("k", 5)).await.unwrap();
        let applied = backend.put(record("k", 3)).await.unwrap();
        assert!(!applied);
        assert_eq!(backend.get("k").await.unwrap().unwrap().version, 5);
    }

    #[tokio::test]
    async fn unhealthy_backend_rejects_reads_and_writes() {
        let backend = InMemoryBackend::new();
        backend.set_healthy(false);
        assert!(backend.get("k").await.is_err());
        assert!(backend.put(record("k", 1)).await.is_err());
    }

    #[tokio::test]
    async fn delete_removes_the_record() {
        let backend = InMemoryBackend::new();
        backend.put(record("k", 1)).await.unwrap();
        backend.delete("k").await.unwrap();
        assert_eq!(backend.get("k").await.unwrap(), None);
    }
}
