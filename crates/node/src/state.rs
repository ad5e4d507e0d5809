use std::collections::HashMap;

use rollup_core::{Action, Event, StateMachine};
use rollup_sequencer::TxSequencer;

/// Per-dependency health as last reported via `Event::DependencyHealthChanged`.
#[derive(Default)]
pub struct DependencyHealth {
    healthy: HashMap<String, bool>,
}

impl DependencyHealth {
    fn record(&mut self, dependency: String, healthy: bool) {
        self.healthy.insert(dependency, healthy);
    }

    pub fn is_healthy(&self, dependency: &str) -> Option<bool> {
        self.healthy.get(dependency).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &bool)> {
        self.healthy.iter()
    }
}

/// Composes `TxSequencer` with dependency health tracking behind one
/// `StateMachine` surface.
pub struct NodeStateMachine {
    sequencer: TxSequencer,
    health: DependencyHealth,
}

impl NodeStateMachine {
    pub fn new(sequencer: TxSequencer) -> Self {
        Self { sequencer, health: DependencyHealth::default() }
    }

    pub fn sequencer(&self) -> &TxSequencer {
        &self.sequencer
    }

    pub fn sequencer_mut(&mut self) -> &mut TxSequencer {
        &mut self.sequencer
    }

    pub fn health(&self) -> &DependencyHealth {
        &self.health
    }
}

impl StateMachine for NodeStateMachine {
    fn handle(&mut self, event: Event) -> Vec<Action> {
        if let Event::DependencyHealthChanged { dependency, healthy } = &event {
            self.health.record(dependency.clone(), *healthy);
        }
        self.sequencer.handle(event)
    }

    fn set_time(&mut self, now_unix_seconds: u64) {
        self.sequencer.set_time(now_unix_seconds);
    }

    fn now(&self) -> u64 {
        self.sequencer.now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use rollup_sequencer::SequencerConfig;

    fn node() -> NodeStateMachine {
        NodeStateMachine::new(TxSequencer::new(SequencerConfig::default(), ChaCha20Rng::seed_from_u64(1)))
    }

    #[test]
    fn dependency_health_events_are_recorded_and_forwarded() {
        let mut n = node();
        let actions = n.handle(Event::DependencyHealthChanged {
            dependency: "store".to_string(),
            healthy: false,
        });
        assert!(actions.is_empty());
        assert_eq!(n.health().is_healthy("store"), Some(false));
    }

    #[test]
    fn unknown_dependency_has_no_recorded_health() {
        let n = node();
        assert_eq!(n.health().is_healthy("store"), None);
    }

    #[test]
    fn other_events_delegate_to_the_sequencer() {
        let mut n = node();
        let actions = n.handle(Event::ForceCheckpoint);
        assert!(matches!(actions[0], Action::WriteCheckpoint));
    }

    #[test]
    fn time_is_forwarded_to_the_sequencer() {
        let mut n = node();
        n.set_time(500);
        assert_eq!(n.now(), 500);
    }
}
