//! Connection pool configuration and the prepared-statement registry for
//! the store's named hot-path queries.

use std::time::Duration;

#[derive(Clone, Copy, Debug)]
pub struct ConnectionPoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
}

impl Default for ConnectionPoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(600),
        }
    }
}

/// The fixed set of hot-path statements the store prepares once per
/// backend rather than re-parsing per call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PreparedStatement {
    GetByKey,
    InsertRecord,
    UpdateRecord,
    DeleteByKey,
    GetByShard,
    CountByShard,
}

impl PreparedStatement {
    pub fn sql(self) -> &'static str {
        match self {
            PreparedStatement::GetByKey => "SELECT key, value, version, updated_at FROM state_records WHERE key = $1",
            PreparedStatement::InsertRecord => {
                "INSERT INTO state_records (key, value, version, updated_at) VALUES ($1, $2, $3, $4)
                 ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, version = EXCLUDED.version, updated_at = EXCLUDED.updated_at
                 WHERE state_records.version < EXCLUDED.version"
            }
            PreparedStatement::UpdateRecord => {
                "UPDATE state_records SET value = $2, version = $3, updated_at = $4 WHERE key = $1 AND version < $3"
            }
            PreparedStatement::DeleteByKey => "DELETE FROM state_records WHERE key = $1",
            PreparedStatement::GetByShard => "SELECT key, value, version, updated_at FROM state_records LIMIT $1 OFFSET $2",
            PreparedStatement::CountByShard => "SELECT COUNT(*) FROM state_records",
        }
    }

    pub const ALL: [PreparedStatement; 6] = [
        PreparedStatement::GetByKey,
        PreparedStatement::InsertRecord,
        PreparedStatement::UpdateRecord,
        PreparedStatement::DeleteByKey,
        PreparedStatement::GetByShard,
        PreparedStatement::CountByShard,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_statement_has_non_empty_sql() {
        for stmt in PreparedStatement::ALL {
            assert!(!stmt.sql().is_empty());
        }
    }
}
