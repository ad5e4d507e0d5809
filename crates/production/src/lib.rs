//! Production runner: the async I/O shell around the pure state machines
//! that live in `rollup-node` and `rollup-sequencer`.
//!
//! Nothing in `rollup-core`, `rollup-node`, or `rollup-sequencer` ever
//! touches a socket, a clock, or a filesystem; this crate is where the
//! `Action`s they emit turn into store writes, cache fills, HSM/TSS calls,
//! settlement submissions, and HTTP responses.

pub mod cli;
pub mod config;
pub mod metrics;
pub mod runtime;
pub mod server;
pub mod settlement;
pub mod signer;

pub use config::{Config, ConfigError};
pub use runtime::{Node, SubmitOutcome};
