//! Combined node state machine.
//!
//! This crate composes the sequencer's `StateMachine` with per-dependency
//! health tracking into the single `Event -> Vec<Action>` surface the
//! runner drives. Actions that require actual I/O (persisting a
//! checkpoint, invoking the threshold signer or HSM, calling the
//! settlement chain) are never performed here — `NodeStateMachine::handle`
//! stays a pure function of its event stream, same as every component it
//! wraps; the runner in `rollup-production` is what turns the returned
//! `Action`s into real work.

mod state;

pub use state::{DependencyHealth, NodeStateMachine};
