//! Pre-recovery diagnostic snapshots.
//!
//! Before any invasive recovery action the supervisor dumps process state to
//! one JSON file per event for postmortem analysis. Files are append-only
//! history: written once, never mutated.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use crate::activity::ActivityJournal;
use crate::supervisor::{read_rss_mb, SupervisorState};

#[derive(Debug, Serialize)]
pub struct DiagnosticSnapshot {
    pub timestamp: String,
    pub reason: String,
    pub uptime_secs: u64,
    pub memory_rss_mb: Option<u64>,
    pub last_heartbeat_secs_ago: u64,
    pub last_activity_secs_ago: Option<u64>,
    pub heartbeat_count: u64,
    pub consecutive_failures: u32,
}

pub struct DiagnosticRecorder {
    dir: PathBuf,
    state: Arc<SupervisorState>,
    journal: Arc<ActivityJournal>,
}

impl DiagnosticRecorder {
    pub fn new(
        dir: impl Into<PathBuf>,
        state: Arc<SupervisorState>,
        journal: Arc<ActivityJournal>,
    ) -> Self {
        Self {
            dir: dir.into(),
            state,
            journal,
        }
    }

    /// Write one snapshot file for an emergency event. Returns its path.
    pub async fn record(&self, reason: &str) -> anyhow::Result<PathBuf> {
        let now = Utc::now();
        let snapshot = DiagnosticSnapshot {
            timestamp: now.to_rfc3339(),
            reason: reason.to_string(),
            uptime_secs: self.state.uptime_secs(),
            memory_rss_mb: read_rss_mb(),
            last_heartbeat_secs_ago: self.state.last_heartbeat_secs_ago(),
            last_activity_secs_ago: self.journal.last_activity_secs_ago(),
            heartbeat_count: self.state.beat_count(),
            consecutive_failures: self.state.failures(),
        };

        tokio::fs::create_dir_all(&self.dir).await?;
        // ISO-8601-derived name, colons swapped for filesystem safety.
        let name = format!(
            "diag-{}.json",
            now.format("%Y-%m-%dT%H-%M-%S%.3fZ")
        );
        let path = self.dir.join(name);
        tokio::fs::write(&path, serde_json::to_vec_pretty(&snapshot)?).await?;

        info!(path = %path.display(), reason, "Wrote diagnostic snapshot");
        Ok(path)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn snapshot_contains_state_fields() {
        let tmp = tempfile::tempdir().unwrap();
        let state = Arc::new(SupervisorState::new());
        state.increment_beats();
        state.increment_failures();
        let recorder = DiagnosticRecorder::new(
            tmp.path().join("diag"),
            state,
            Arc::new(ActivityJournal::new()),
        );

        let path = recorder.record("test-event").await.unwrap();
        let parsed: serde_json::Value =
            serde_json::from_slice(&tokio::fs::read(&path).await.unwrap()).unwrap();
        assert_eq!(parsed["reason"], "test-event");
        assert_eq!(parsed["heartbeat_count"], 1);
        assert_eq!(parsed["consecutive_failures"], 1);
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("diag-"));
    }

    #[tokio::test]
    async fn each_event_gets_its_own_file() {
        let tmp = tempfile::tempdir().unwrap();
        let recorder = DiagnosticRecorder::new(
            tmp.path().join("diag"),
            Arc::new(SupervisorState::new()),
            Arc::new(ActivityJournal::new()),
        );
        let a = recorder.record("one").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let b = recorder.record("two").await.unwrap();
        assert_ne!(a, b);
        assert_eq!(std::fs::read_dir(recorder.dir()).unwrap().count(), 2);
    }
}
