//! Durable checkpoint for pipeline state.
//!
//! The full [`PipelineState`] is rewritten after every unit of work (one
//! categorization, one batch summary, one headline/concluding pass), so a
//! crash or interrupt loses at most the in-flight unit and never repeats
//! paid-for inference on restart.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::CheckpointError;
use crate::pipeline::types::PipelineState;

/// JSON-file-backed store for [`PipelineState`].
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist the full state, overwriting in place.
    ///
    /// Writes to a sibling temp file and renames it over the target so an
    /// interrupted write cannot corrupt the previous checkpoint.
    pub fn save(&self, state: &PipelineState) -> Result<(), CheckpointError> {
        let data = serde_json::to_string_pretty(state).map_err(|e| CheckpointError::Write {
            path: self.display_path(),
            reason: e.to_string(),
        })?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, data).map_err(|e| CheckpointError::Write {
            path: self.display_path(),
            reason: e.to_string(),
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|e| CheckpointError::Write {
            path: self.display_path(),
            reason: e.to_string(),
        })?;

        debug!(path = %self.path.display(), "Checkpoint saved");
        Ok(())
    }

    /// Load a previously saved state, or `None` if no checkpoint exists.
    ///
    /// A present-but-unreadable checkpoint is an error, not a fresh start;
    /// the operator decides whether to repair or delete it.
    pub fn load(&self) -> Result<Option<PipelineState>, CheckpointError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(&self.path).map_err(|e| CheckpointError::Read {
            path: self.display_path(),
            reason: e.to_string(),
        })?;
        let state: PipelineState =
            serde_json::from_str(&raw).map_err(|e| CheckpointError::Corrupt {
                path: self.display_path(),
                reason: e.to_string(),
            })?;

        info!(
            path = %self.path.display(),
            records = state.records.len(),
            batches = state.batch_summaries.len(),
            "Resuming from checkpoint"
        );
        Ok(Some(state))
    }

    /// Remove the checkpoint after a successful run.
    pub fn clear(&self) -> Result<(), CheckpointError> {
        if self.path.exists() {
            std::fs::remove_file(&self.path).map_err(|e| CheckpointError::Write {
                path: self.display_path(),
                reason: e.to_string(),
            })?;
            debug!(path = %self.path.display(), "Checkpoint cleared");
        }
        Ok(())
    }

    fn display_path(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::{EmailRecord, batch_key};

    fn sample_state() -> PipelineState {
        let mut state = PipelineState::default();
        let mut record = EmailRecord::new(
            "<1@example>",
            "Tue, 1 Jul 2025 10:00:00 +0000",
            "alice@example.com",
            "Quarterly report",
            "The numbers are in.",
            "",
        );
        record.category = "WORK".to_string();
        state.records.push(record);
        state
            .batch_summaries
            .insert(batch_key("WORK", 0), "Work happened.".to_string());
        state
    }

    #[test]
    fn load_returns_none_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("state.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("state.json"));

        store.save(&sample_state()).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.records.len(), 1);
        assert_eq!(loaded.records[0].category, "WORK");
        assert_eq!(loaded.batch_summaries["WORK#0"], "Work happened.");
    }

    #[test]
    fn save_overwrites_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("state.json"));

        store.save(&sample_state()).unwrap();
        let mut updated = sample_state();
        updated.headline_summary = Some("Headline.".to_string());
        store.save(&updated).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.headline_summary.as_deref(), Some("Headline."));
        // No stray temp file left behind.
        assert!(!dir.path().join("state.json.tmp").exists());
    }

    #[test]
    fn corrupt_checkpoint_is_an_error_not_a_fresh_start() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = CheckpointStore::new(&path);
        assert!(matches!(
            store.load(),
            Err(CheckpointError::Corrupt { .. })
        ));
    }

    #[test]
    fn clear_removes_the_file_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("state.json"));

        store.save(&sample_state()).unwrap();
        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        store.clear().unwrap();
    }
}
