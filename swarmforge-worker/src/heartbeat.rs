//! Heartbeat publication (spec.md §4.3 step 10, §6 heartbeat artifact).
//!
//! Overwritten every 15s at a per-worker path so the Health Monitor and any
//! external observer can read current progress without tailing a log.

use crate::error::WorkerError;
use std::path::{Path, PathBuf};
use swarmforge_types::{Heartbeat, TaskId, WorkerId, WorkerStep};

/// The interval at which the execution loop is expected to publish a
/// heartbeat (spec.md §4.3 step 10, §4.4 stall-detection default).
pub const HEARTBEAT_INTERVAL_SECS: u64 = 15;

pub struct HeartbeatPublisher {
    worker_id: WorkerId,
    path: PathBuf,
}

impl HeartbeatPublisher {
    pub fn new(worker_id: WorkerId, state_dir: impl AsRef<Path>) -> Self {
        let path = state_dir.as_ref().join(format!("heartbeat-{}.json", worker_id.0));
        Self { worker_id, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrite the heartbeat artifact with the worker's current step.
    pub fn publish(
        &self,
        task_id: Option<TaskId>,
        step: WorkerStep,
        progress_pct: f32,
    ) -> Result<Heartbeat, WorkerError> {
        let heartbeat = Heartbeat {
            worker_id: self.worker_id,
            timestamp: chrono::Utc::now(),
            task_id,
            step,
            progress_pct,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec_pretty(&heartbeat)?;
        std::fs::write(&self.path, bytes)?;
        Ok(heartbeat)
    }
}
