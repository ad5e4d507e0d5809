//! Sharded, replicated state storage (Component E): consistent-hash
//! routing with virtual nodes, pluggable backends, a bounded query cache,
//! and a minimal transaction surface with rollback.

mod backend;
mod error;
mod pool;
mod query_cache;
mod ring;
mod store;
mod strategy;

pub use backend::{InMemoryBackend, PostgresBackend, ShardBackend, SharedBackend};
pub use error::StoreError;
pub use pool::{ConnectionPoolConfig, PreparedStatement};
pub use query_cache::QueryCache;
pub use ring::{ConsistentHashRing, ShardId};
pub use store::{ShardedStore, ShardedStoreConfig, TxOp};
pub use strategy::{RoutingContext, ShardingStrategy};
