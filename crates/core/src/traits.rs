//! The `StateMachine` trait: the one seam every component is wired through.
//!
//! Implementations are synchronous and deterministic given their event
//! stream and injected clock — no I/O, no thread spawning, no reaching for
//! a global clock. The runner (`rollup-production`) is the only layer that
//! performs actual I/O, driven by the `Action`s returned here.

use crate::{Action, Event};

/// A deterministic component: `handle` is a pure function of `(self,
/// event)` plus whatever time was last injected via `set_time`.
pub trait StateMachine {
    /// Process one event, returning the actions the runner should perform.
    fn handle(&mut self, event: Event) -> Vec<Action>;

    /// Inject the current time. Called by the runner before any event that
    /// depends on wall-clock comparisons (expiry checks, batch tickers,
    /// checkpoint intervals).
    fn set_time(&mut self, now_unix_seconds: u64);

    /// The time last injected via `set_time`.
    fn now(&self) -> u64;
}
