//! Checkpoint persistence: a point-in-time snapshot of sequencer state,
//! written to a flat file so a restart can resume without replaying every
//! transaction since genesis.

use std::fs;
use std::path::Path;

use rollup_sequencer::SequencerSnapshot;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed checkpoint: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Checkpoint {
    pub sequencer: SequencerSnapshot,
    pub created_at: u64,
}

/// Serialize `checkpoint` and write it to `path`, via a temp-file-then-
/// rename so a crash mid-write never leaves a half-written checkpoint
/// behind to be picked up on the next restore.
pub fn write_checkpoint(checkpoint: &Checkpoint, path: &Path) -> Result<(), CheckpointError> {
    let encoded = serde_json::to_vec_pretty(checkpoint)?;
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, &encoded)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

pub fn read_checkpoint(path: &Path) -> Result<Option<Checkpoint>, CheckpointError> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = fs::read(path)?;
    let checkpoint = serde_json::from_slice(&bytes)?;
    Ok(Some(checkpoint))
}

/// Tracks how many processed transactions have elapsed since the last
/// checkpoint, firing once `checkpoint_interval` is crossed.
pub struct CheckpointPolicy {
    checkpoint_interval: u64,
    since_last: u64,
}

impl CheckpointPolicy {
    pub fn new(checkpoint_interval: u64) -> Self {
        Self { checkpoint_interval, since_last: 0 }
    }

    /// Record that `count` transactions were processed. Returns `true` if
    /// a checkpoint should now be taken (and resets the counter).
    pub fn record_processed(&mut self, count: u64) -> bool {
        self.since_last += count;
        if self.since_last >= self.checkpoint_interval {
            self.since_last = 0;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollup_sequencer::{SequencerConfig, TxSequencer};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use tempfile::tempdir;

    #[test]
    fn write_then_read_round_trips_an_empty_snapshot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("checkpoint.json");

        let sequencer = TxSequencer::new(SequencerConfig::default(), ChaCha20Rng::seed_from_u64(1));
        let checkpoint = Checkpoint { sequencer: sequencer.snapshot(), created_at: 100 };

        write_checkpoint(&checkpoint, &path).unwrap();
        let restored = read_checkpoint(&path).unwrap().unwrap();
        assert_eq!(restored.created_at, 100);
        assert!(restored.sequencer.fifo.is_empty());
    }

    #[test]
    fn missing_file_reads_as_none() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.json");
        assert!(read_checkpoint(&path).unwrap().is_none());
    }

    #[test]
    fn policy_fires_once_interval_is_crossed() {
        let mut policy = CheckpointPolicy::new(10);
        assert!(!policy.record_processed(7));
        assert!(policy.record_processed(3));
    }

    #[test]
    fn policy_resets_after_firing() {
        let mut policy = CheckpointPolicy::new(5);
        assert!(policy.record_processed(5));
        assert!(!policy.record_processed(4));
        assert!(policy.record_processed(1));
    }
}
