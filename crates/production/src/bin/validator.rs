//! Entry point for the `rollup-validator` binary: parses the CLI, wires up
//! tracing, and dispatches to the `serve`/`migrate`/`reconcile`/`rotate-key`/
//! `backup-key` subcommands.
//!
//! Exit codes: `0` ok, `1` config error, `2` a required dependency was
//! unreachable at startup, `3` migration failure, `4` graceful shutdown
//! timed out.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::Parser;
use rollup_hsm::{HsmProvider, SoftHsm};
use rollup_production::cli::{Cli, Command};
use rollup_production::config::Config;
use rollup_production::runtime::Node;
use rollup_production::server::router;
use rollup_production::settlement::InMemorySettlementChain;
use tracing::{error, info, warn};

fn now_unix() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    let code = match cli.command {
        Command::Serve => run_serve(config).await,
        Command::Migrate => run_migrate(config).await,
        Command::Reconcile { force } => run_reconcile(config, force).await,
        Command::RotateKey { id } => run_rotate_key(config, id),
        Command::BackupKey { id, out } => run_backup_key(config, id, out),
    };
    std::process::exit(code);
}

async fn run_serve(config: Config) -> i32 {
    let node = Arc::new(Node::new(config.clone(), Arc::new(InMemorySettlementChain::new()), now_unix()));

    if let Err(e) = node.restore_checkpoint() {
        error!(error = %e, "checkpoint is present but could not be decoded; refusing to start");
        return 2;
    }

    let shards = node.store.health_check_all().await;
    if shards.iter().any(|(_, healthy)| !healthy) {
        warn!("one or more shards are unreachable at startup");
    }
    if shards.iter().all(|(_, healthy)| !healthy) && !shards.is_empty() {
        error!("no healthy shard replicas at startup");
        return 2;
    }

    let listener = match tokio::net::TcpListener::bind(&config.listen_addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(error = %e, addr = %config.listen_addr, "failed to bind listen address");
            return 1;
        }
    };
    info!(addr = %config.listen_addr, "rollup-validator listening");

    let ticker_node = node.clone();
    let ticker = tokio::spawn(async move {
        let mut interval = tokio::time::interval(config.batch_interval.max(Duration::from_millis(100)));
        loop {
            interval.tick().await;
            ticker_node.tick(now_unix()).await;
        }
    });

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    let serve_result = axum::serve(listener, router(node)).with_graceful_shutdown(shutdown).await;
    ticker.abort();

    match serve_result {
        Ok(()) => 0,
        Err(e) => {
            error!(error = %e, "gateway server exited with an error");
            4
        }
    }
}

async fn run_migrate(config: Config) -> i32 {
    if config.store_connection_string.starts_with("memory://") {
        info!("in-memory store needs no schema migration");
        return 0;
    }
    let pool = match sqlx::postgres::PgPoolOptions::new().max_connections(1).connect(&config.store_connection_string).await {
        Ok(p) => p,
        Err(e) => {
            error!(error = %e, "could not connect to store for migration");
            return 2;
        }
    };
    let backend = rollup_store::PostgresBackend::new(pool);
    match backend.ensure_schema().await {
        Ok(()) => {
            info!("schema migration applied");
            0
        }
        Err(e) => {
            error!(error = %e, "schema migration failed");
            3
        }
    }
}

async fn run_reconcile(config: Config, force: bool) -> i32 {
    let node = Node::new(config, Arc::new(InMemorySettlementChain::new()), now_unix());
    if let Err(e) = node.restore_checkpoint() {
        error!(error = %e, "checkpoint could not be decoded");
        return 2;
    }
    loop {
        node.tick(node.now()).await;
        if !force || node.reconciliation_pending_count() == 0 {
            break;
        }
    }
    0
}

fn run_rotate_key(config: Config, new_key_id: String) -> i32 {
    let mut hsm = SoftHsm::default();
    let mut key = match rollup_hsm::HsmBoundKey::generate(&mut hsm, "current", vec![], 1, 1, now_unix()) {
        Ok(k) => k,
        Err(e) => {
            error!(error = %e, "rotate-key failed");
            return 2;
        }
    };
    let grace_until = now_unix() + config.hsm_grace_period.as_secs();
    match key.begin_rotation(&mut hsm, &new_key_id, grace_until) {
        Ok(()) => {
            info!(new_key_id = %new_key_id, grace_until, "rotation started, old key remains accepted until the grace period ends");
            0
        }
        Err(e) => {
            error!(error = %e, "rotate-key failed");
            2
        }
    }
}

fn run_backup_key(_config: Config, key_id: String, out: std::path::PathBuf) -> i32 {
    let mut hsm = SoftHsm::default();
    if let Err(e) = hsm.generate_key(&key_id, rollup_hsm::KeyType::Secp256k1, rollup_hsm::KeyUsage::Sign, rollup_hsm::KeyAttributes::default()) {
        error!(error = %e, "no such key to back up");
        return 2;
    }
    let passphrase = match std::env::var("ROLLUP_BACKUP_PASSPHRASE") {
        Ok(p) => p,
        Err(_) => {
            error!("ROLLUP_BACKUP_PASSPHRASE must be set to export a key backup");
            return 1;
        }
    };
    let blob = match hsm.backup(&key_id, &passphrase) {
        Ok(b) => b,
        Err(e) => {
            error!(error = %e, "backup failed");
            return 2;
        }
    };
    let encoded = serde_json::json!({
        "key_id": key_id,
        "ciphertext": hex::encode(&blob.ciphertext),
        "nonce": hex::encode(blob.nonce),
    });
    if let Err(e) = std::fs::write(&out, encoded.to_string()) {
        error!(error = %e, path = ?out, "failed to write backup file");
        return 2;
    }
    info!(path = ?out, "key backup written");
    0
}
