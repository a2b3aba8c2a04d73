//! Lifecycle events (spec.md §4.7). Every payload is read-only: ids and
//! timings only, never a handle back into scheduler state.

use chrono::{DateTime, Utc};
use serde::Serialize;
use swarmforge_types::{EscalationCategory, TaskId, WorkerId};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    ExecutionStarted {
        feature_id: String,
        worker_count: usize,
        at: DateTime<Utc>,
    },
    ExecutionFinished {
        feature_id: String,
        succeeded: bool,
        at: DateTime<Utc>,
    },
    WorkerSpawned {
        feature_id: String,
        worker_id: WorkerId,
        branch: String,
        at: DateTime<Utc>,
    },
    TaskStarted {
        feature_id: String,
        task_id: TaskId,
        worker_id: WorkerId,
        level: u32,
        at: DateTime<Utc>,
    },
    TaskCompleted {
        feature_id: String,
        task_id: TaskId,
        worker_id: WorkerId,
        level: u32,
        outcome: TaskOutcomeKind,
        escalation_category: Option<EscalationCategory>,
        duration_ms: i64,
        at: DateTime<Utc>,
    },
    QualityGateRun {
        feature_id: String,
        level: u32,
        gate_name: String,
        passed: bool,
        at: DateTime<Utc>,
    },
    LevelComplete {
        feature_id: String,
        level: u32,
        merged: bool,
        at: DateTime<Utc>,
    },
    MergeComplete {
        feature_id: String,
        level: u32,
        merge_commit: String,
        tag: String,
        at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskOutcomeKind {
    Completed,
    RetryPending,
    Blocked,
    Checkpoint,
}

impl LifecycleEvent {
    pub fn feature_id(&self) -> &str {
        match self {
            LifecycleEvent::ExecutionStarted { feature_id, .. }
            | LifecycleEvent::ExecutionFinished { feature_id, .. }
            | LifecycleEvent::WorkerSpawned { feature_id, .. }
            | LifecycleEvent::TaskStarted { feature_id, .. }
            | LifecycleEvent::TaskCompleted { feature_id, .. }
            | LifecycleEvent::QualityGateRun { feature_id, .. }
            | LifecycleEvent::LevelComplete { feature_id, .. }
            | LifecycleEvent::MergeComplete { feature_id, .. } => feature_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::ExecutionStarted { .. } => "execution_started",
            LifecycleEvent::ExecutionFinished { .. } => "execution_finished",
            LifecycleEvent::WorkerSpawned { .. } => "worker_spawned",
            LifecycleEvent::TaskStarted { .. } => "task_started",
            LifecycleEvent::TaskCompleted { .. } => "task_completed",
            LifecycleEvent::QualityGateRun { .. } => "quality_gate_run",
            LifecycleEvent::LevelComplete { .. } => "level_complete",
            LifecycleEvent::MergeComplete { .. } => "merge_complete",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_id_and_name_agree_with_the_wire_tag() {
        let event = LifecycleEvent::TaskStarted {
            feature_id: "feat-1".into(),
            task_id: TaskId::from("T1"),
            worker_id: WorkerId(0),
            level: 1,
            at: Utc::now(),
        };
        assert_eq!(event.feature_id(), "feat-1");
        assert_eq!(event.name(), "task_started");

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "task_started");
    }

    #[test]
    fn merge_complete_carries_tag_and_commit() {
        let event = LifecycleEvent::MergeComplete {
            feature_id: "feat-1".into(),
            level: 2,
            merge_commit: "deadbeef".into(),
            tag: "feat-1/level-2-complete".into(),
            at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["merge_commit"], "deadbeef");
        assert_eq!(json["tag"], "feat-1/level-2-complete");
        assert_eq!(event.name(), "merge_complete");
    }
}
