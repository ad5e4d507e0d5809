//! Environment-driven configuration for the validator binary.
//!
//! Every setting has a default so a bare `rollup-validator serve` works
//! against an in-memory store and a fake settlement chain; production
//! deployments override via the env vars named below.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("env var {0} has an invalid value: {1}")]
    InvalidValue(&'static str, String),
}

/// Which HSM backend to instantiate. Only `soft` (the in-process
/// reference implementation) exists today; the variant exists so a real
/// vendor backend can be added without changing the config shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HsmProviderKind {
    Soft,
}

/// Which secrets provider supplies the HSM backup passphrase and the
/// settlement chain credentials. `Env` reads them directly from process
/// environment; other variants are placeholders for a real deployment's
/// secrets manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SecretsProviderKind {
    Env,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub store_connection_string: String,
    pub settlement_chain_connection_string: String,
    pub hsm_provider: HsmProviderKind,
    pub hsm_credentials: String,
    pub sequencer_keypair_path: String,
    pub shard_count: u32,
    pub replication_factor: usize,
    pub max_batch_size: usize,
    pub batch_interval: Duration,
    pub cache_base_capacity: usize,
    pub cache_base_ttl: Duration,
    pub hsm_grace_period: Duration,
    pub secrets_provider: SecretsProviderKind,
    pub listen_addr: String,
    pub checkpoint_path: String,
    pub checkpoint_interval: u64,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Err(_) => Ok(default),
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue(key, raw)),
    }
}

impl Config {
    /// Load configuration from the process environment, falling back to
    /// defaults suitable for a single-node local run.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            store_connection_string: env_or("ROLLUP_STORE_URL", "memory://"),
            settlement_chain_connection_string: env_or("ROLLUP_SETTLEMENT_CHAIN_URL", "memory://"),
            hsm_provider: match env_or("ROLLUP_HSM_PROVIDER", "soft").as_str() {
                "soft" => HsmProviderKind::Soft,
                other => return Err(ConfigError::InvalidValue("ROLLUP_HSM_PROVIDER", other.to_string())),
            },
            hsm_credentials: env_or("ROLLUP_HSM_CREDENTIALS", "local-dev-passphrase"),
            sequencer_keypair_path: env_or("ROLLUP_SEQUENCER_KEYPAIR_PATH", "./sequencer.key"),
            shard_count: env_parsed("ROLLUP_SHARD_COUNT", 4)?,
            replication_factor: env_parsed("ROLLUP_REPLICATION_FACTOR", 3usize)?,
            max_batch_size: env_parsed("ROLLUP_BATCH_SIZE", 500usize)?,
            batch_interval: Duration::from_secs(env_parsed("ROLLUP_BATCH_INTERVAL_SECONDS", 2u64)?),
            cache_base_capacity: env_parsed("ROLLUP_CACHE_CAPACITY", 10_000usize)?,
            cache_base_ttl: Duration::from_secs(env_parsed("ROLLUP_CACHE_TTL_SECONDS", 300u64)?),
            hsm_grace_period: Duration::from_secs(env_parsed("ROLLUP_HSM_GRACE_PERIOD_SECONDS", 3600u64)?),
            secrets_provider: match env_or("ROLLUP_SECRETS_PROVIDER", "env").as_str() {
                "env" => SecretsProviderKind::Env,
                other => return Err(ConfigError::InvalidValue("ROLLUP_SECRETS_PROVIDER", other.to_string())),
            },
            listen_addr: env_or("ROLLUP_LISTEN_ADDR", "0.0.0.0:8080"),
            checkpoint_path: env_or("ROLLUP_CHECKPOINT_PATH", "./checkpoint.bin"),
            checkpoint_interval: env_parsed("ROLLUP_CHECKPOINT_INTERVAL", 1_000u64)?,
        })
    }
}
