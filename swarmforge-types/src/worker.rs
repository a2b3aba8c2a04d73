//! Runtime worker state (spec.md §3 "Worker").

use crate::ids::{TaskId, WorkerId};
use crate::status::WorkerStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub worker_id: WorkerId,
    pub status: WorkerStatus,
    pub current_task_id: Option<TaskId>,
    pub retry_count_for_current_task: u32,
    pub last_heartbeat_at: DateTime<Utc>,
    pub context_usage: f32,
    pub worktree: PathBuf,
    pub branch: String,
}

impl Worker {
    pub fn new(worker_id: WorkerId, worktree: PathBuf, branch: String) -> Self {
        Self {
            worker_id,
            status: WorkerStatus::Starting,
            current_task_id: None,
            retry_count_for_current_task: 0,
            last_heartbeat_at: Utc::now(),
            context_usage: 0.0,
            worktree,
            branch,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.status, WorkerStatus::Idle | WorkerStatus::Starting) && self.current_task_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_worker_starts_idle_with_zero_context_usage() {
        let worker = Worker::new(WorkerId(0), PathBuf::from("/tmp/w0"), "feat/worker-0".into());
        assert_eq!(worker.status, WorkerStatus::Starting);
        assert!(worker.current_task_id.is_none());
        assert_eq!(worker.context_usage, 0.0);
        assert!(worker.is_idle());
    }

    #[test]
    fn worker_with_assigned_task_is_not_idle() {
        let mut worker = Worker::new(WorkerId(1), PathBuf::from("/tmp/w1"), "feat/worker-1".into());
        worker.status = WorkerStatus::Running;
        worker.current_task_id = Some(TaskId::from("T1"));
        assert!(!worker.is_idle());
    }

    #[test]
    fn stalled_worker_is_not_idle_even_without_a_task() {
        let mut worker = Worker::new(WorkerId(2), PathBuf::from("/tmp/w2"), "feat/worker-2".into());
        worker.status = WorkerStatus::Stalled;
        assert!(!worker.is_idle());
    }
}

/// Heartbeat artifact published every 15s (spec.md §4.3 step 10, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Heartbeat {
    pub worker_id: WorkerId,
    pub timestamp: DateTime<Utc>,
    pub task_id: Option<TaskId>,
    pub step: crate::status::WorkerStep,
    pub progress_pct: f32,
}
