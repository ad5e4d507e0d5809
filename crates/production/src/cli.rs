//! Command-line surface for the validator binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "rollup-validator", about = "Off-chain rollup validator node")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP gateway and the sequencer's tick loop.
    Serve,
    /// Apply the persisted-store schema to the configured backend.
    Migrate,
    /// Drain the reconciliation queue against the settlement chain.
    Reconcile {
        /// Ignore the reconciliation circuit breaker and keep draining
        /// until the pending queue is empty.
        #[arg(long)]
        force: bool,
    },
    /// Begin rotation from the current signing key to a freshly generated
    /// one, keeping the old key accepted through its grace period.
    RotateKey {
        /// Id of the new HSM key to rotate to.
        id: String,
    },
    /// Export an encrypted backup of a logical signing key.
    BackupKey {
        /// Id of the HSM key to back up.
        id: String,
        #[arg(long)]
        out: PathBuf,
    },
}
