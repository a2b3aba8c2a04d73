//! Runtime state for one feature (spec.md §3 "FeatureState", §6 persisted
//! feature state document).

use crate::ids::{TaskId, WorkerId};
use crate::status::{LevelStatus, TaskStatus};
use crate::worker::Worker;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-task runtime record, keyed by `TaskId` in `FeatureState::tasks`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub status: TaskStatus,
    #[serde(default)]
    pub assigned_worker_id: Option<WorkerId>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

impl TaskRecord {
    pub fn pending() -> Self {
        Self {
            status: TaskStatus::Pending,
            assigned_worker_id: None,
            retry_count: 0,
            last_error: None,
            started_at: None,
            finished_at: None,
        }
    }
}

/// Per-level runtime record, keyed by level index in `FeatureState::levels`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LevelRecord {
    pub status: Option<LevelStatus>,
    #[serde(default)]
    pub merge_commit: Option<String>,
}

impl LevelRecord {
    pub fn pending() -> Self {
        Self {
            status: Some(LevelStatus::Pending),
            merge_commit: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureState {
    pub feature_id: String,
    pub current_level: u32,
    pub tasks: HashMap<TaskId, TaskRecord>,
    pub workers: HashMap<WorkerId, Worker>,
    pub levels: HashMap<u32, LevelRecord>,
}

impl FeatureState {
    pub fn new(feature_id: impl Into<String>) -> Self {
        Self {
            feature_id: feature_id.into(),
            current_level: 1,
            tasks: HashMap::new(),
            workers: HashMap::new(),
            levels: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_feature_state_starts_at_level_one_with_no_records() {
        let state = FeatureState::new("feat-1");
        assert_eq!(state.feature_id, "feat-1");
        assert_eq!(state.current_level, 1);
        assert!(state.tasks.is_empty());
        assert!(state.workers.is_empty());
        assert!(state.levels.is_empty());
    }

    #[test]
    fn pending_task_record_has_zero_retries_and_no_assignment() {
        let record = TaskRecord::pending();
        assert_eq!(record.status, TaskStatus::Pending);
        assert!(record.assigned_worker_id.is_none());
        assert_eq!(record.retry_count, 0);
        assert!(record.last_error.is_none());
    }

    #[test]
    fn pending_level_record_has_no_merge_commit() {
        let record = LevelRecord::pending();
        assert_eq!(record.status, Some(LevelStatus::Pending));
        assert!(record.merge_commit.is_none());
    }

    #[test]
    fn feature_state_round_trips_through_json() {
        let mut state = FeatureState::new("feat-2");
        state.tasks.insert(TaskId::from("T1"), TaskRecord::pending());
        state.levels.insert(1, LevelRecord::pending());
        let json = serde_json::to_string(&state).unwrap();
        let back: FeatureState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.feature_id, "feat-2");
        assert_eq!(back.tasks.len(), 1);
        assert_eq!(back.levels.len(), 1);
    }
}
