//! `StateManager`: the two-tier task/worker state store (spec.md §4.2).

use crate::error::StateError;
use crate::tier_a::{FailureOutcome, TaskRegistry};
use crate::tier_b::SnapshotStore;
use std::path::PathBuf;
use swarmforge_types::{
    FeatureState, Heartbeat, LevelRecord, TaskGraph, TaskId, TaskRecord, TaskStatus, WorkerId,
};

pub struct StateManager {
    feature_id: String,
    registry: TaskRegistry,
    snapshots: SnapshotStore,
}

impl StateManager {
    /// Open the feature's state, applying the reconciliation rule: if a
    /// durable snapshot already exists it seeds the in-process registry
    /// (cold start); otherwise a fresh registry is created and immediately
    /// flushed so Tier B exists from the first mutation onward.
    pub fn open_or_restore(
        feature_id: impl Into<String>,
        snapshot_path: impl Into<PathBuf>,
    ) -> Result<Self, StateError> {
        let feature_id = feature_id.into();
        let snapshots = SnapshotStore::new(snapshot_path);

        let registry = match snapshots.load()? {
            Some(state) => TaskRegistry::from_state(state),
            None => TaskRegistry::new(feature_id.clone()),
        };

        let manager = Self {
            feature_id,
            registry,
            snapshots,
        };
        manager.flush()?;
        Ok(manager)
    }

    fn flush(&self) -> Result<(), StateError> {
        self.snapshots.write(&self.registry.snapshot())
    }

    pub fn feature_id(&self) -> &str {
        &self.feature_id
    }

    pub fn create_task(&self, task_id: TaskId) -> Result<(), StateError> {
        self.registry.create_task(task_id);
        self.flush()
    }

    pub fn update_task_status(
        &self,
        task_id: &TaskId,
        status: TaskStatus,
        error: Option<String>,
    ) -> Result<bool, StateError> {
        let applied = self.registry.update_task_status(task_id, status, error);
        if applied {
            self.flush()?;
        }
        Ok(applied)
    }

    /// Recoverable verification failure (spec.md §4.3 step 7): see
    /// [`TaskRegistry::fail_task`].
    pub fn fail_task(
        &self,
        task_id: &TaskId,
        error: Option<String>,
        max_retries: u32,
    ) -> Result<Option<FailureOutcome>, StateError> {
        let outcome = self.registry.fail_task(task_id, error, max_retries);
        if outcome.is_some() {
            self.flush()?;
        }
        Ok(outcome)
    }

    /// Non-retryable failure (spec.md §7 `TASK_PROTOCOL_VIOLATION` and the
    /// `DEPENDENCY_MISSING`/`AMBIGUOUS_SPEC` edge cases): see
    /// [`TaskRegistry::block_task`].
    pub fn block_task(&self, task_id: &TaskId, error: Option<String>) -> Result<bool, StateError> {
        let blocked = self.registry.block_task(task_id, error);
        if blocked {
            self.flush()?;
        }
        Ok(blocked)
    }

    /// See [`TaskRegistry::force_reset_task`].
    pub fn force_reset_task(&self, task_id: &TaskId, reset_counter: bool) -> Result<bool, StateError> {
        let reset = self.registry.force_reset_task(task_id, reset_counter);
        if reset {
            self.flush()?;
        }
        Ok(reset)
    }

    /// See [`TaskRegistry::requeue_stalled_task`].
    pub fn requeue_stalled_task(&self, task_id: &TaskId) -> Result<bool, StateError> {
        let requeued = self.registry.requeue_stalled_task(task_id);
        if requeued {
            self.flush()?;
        }
        Ok(requeued)
    }

    pub fn get_task(&self, task_id: &TaskId) -> Option<TaskRecord> {
        self.registry.get_task(task_id)
    }

    pub fn list_tasks(&self) -> std::collections::HashMap<TaskId, TaskRecord> {
        self.registry.list_tasks()
    }

    pub fn get_worker(&self, worker_id: WorkerId) -> Option<swarmforge_types::Worker> {
        self.registry.get_worker(worker_id)
    }

    pub fn list_workers(&self) -> std::collections::HashMap<WorkerId, swarmforge_types::Worker> {
        self.registry.list_workers()
    }

    pub fn ensure_worker(&self, worker_id: WorkerId, worktree: PathBuf, branch: String) {
        self.registry.ensure_worker(worker_id, worktree, branch);
    }

    pub fn update_worker_status(&self, worker_id: WorkerId, status: swarmforge_types::WorkerStatus) {
        self.registry.update_worker_status(worker_id, status);
    }

    pub fn update_worker_task(&self, worker_id: WorkerId, task_id: Option<TaskId>) {
        self.registry.update_worker_task(worker_id, task_id);
    }

    /// Atomic claim per spec.md §4.2: succeeds only if pending (or paused,
    /// for resume after a checkpoint) with all dependencies completed.
    pub fn claim_task(
        &self,
        graph: &TaskGraph,
        task_id: &TaskId,
        worker_id: WorkerId,
    ) -> Result<bool, StateError> {
        let claimed = self.registry.claim_task(graph, task_id, worker_id);
        if claimed {
            self.flush()?;
        }
        Ok(claimed)
    }

    /// Heartbeats update the in-memory Worker record only; they do not
    /// trigger a Tier B flush, since they arrive every 15s and a full
    /// feature-state snapshot write is unwarranted at that cadence. The
    /// heartbeat artifact itself (spec.md §6) is published separately by
    /// the worker runtime.
    pub fn record_worker_heartbeat(
        &self,
        heartbeat: &Heartbeat,
        worktree: PathBuf,
        branch: String,
    ) {
        self.registry.record_worker_heartbeat(heartbeat, worktree, branch);
    }

    pub fn update_level_status(&self, level: u32, record: LevelRecord) -> Result<(), StateError> {
        self.registry.update_level_status(level, record);
        self.flush()
    }

    pub fn advance_level(&self, level: u32) -> Result<(), StateError> {
        self.registry.set_current_level(level);
        self.flush()
    }

    pub fn snapshot(&self) -> FeatureState {
        self.registry.snapshot()
    }

    pub fn restore(&self, snapshot: FeatureState) -> Result<(), StateError> {
        self.registry.restore(snapshot);
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarmforge_types::{Level, LevelIndex, RawTaskGraph, Task, TaskFiles, Verification};
    use std::collections::{HashMap, HashSet};

    fn one_task_graph() -> TaskGraph {
        let task = Task {
            id: TaskId::from("T1"),
            title: "first".into(),
            description: String::new(),
            level: 1,
            dependencies: HashSet::new(),
            files: TaskFiles::default(),
            verification: Verification {
                command: "true".into(),
                timeout_seconds: 10,
            },
            integration_test: None,
            estimate_minutes: None,
        };
        let mut tasks = HashMap::new();
        tasks.insert(task.id.clone(), task);
        TaskGraph {
            feature_id: "demo".into(),
            tasks,
            levels: vec![Level {
                level_index: LevelIndex(1),
                tasks: ["T1".into()].into_iter().map(TaskId).collect(),
            }],
        }
    }

    #[test]
    fn claim_requires_pending_and_satisfied_dependencies() {
        let dir = tempfile::tempdir().unwrap();
        let manager =
            StateManager::open_or_restore("demo", dir.path().join("state.json")).unwrap();
        let graph = one_task_graph();
        manager.create_task(TaskId::from("T1")).unwrap();

        assert!(manager.claim_task(&graph, &TaskId::from("T1"), WorkerId(0)).unwrap());
        // Already claimed: second claim must fail.
        assert!(!manager.claim_task(&graph, &TaskId::from("T1"), WorkerId(1)).unwrap());
    }

    #[test]
    fn reopening_reconciles_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        {
            let manager = StateManager::open_or_restore("demo", &path).unwrap();
            manager.create_task(TaskId::from("T1")).unwrap();
            manager
                .update_task_status(&TaskId::from("T1"), TaskStatus::InProgress, None)
                .unwrap();
        }

        let reopened = StateManager::open_or_restore("demo", &path).unwrap();
        let record = reopened.get_task(&TaskId::from("T1")).unwrap();
        assert_eq!(record.status, TaskStatus::InProgress);
    }

    #[test]
    fn illegal_transition_is_rejected_without_flush() {
        let dir = tempfile::tempdir().unwrap();
        let manager =
            StateManager::open_or_restore("demo", dir.path().join("state.json")).unwrap();
        manager.create_task(TaskId::from("T1")).unwrap();

        let applied = manager
            .update_task_status(&TaskId::from("T1"), TaskStatus::Completed, None)
            .unwrap();
        assert!(!applied);
    }

    #[test]
    fn fail_task_retries_then_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let manager =
            StateManager::open_or_restore("demo", dir.path().join("state.json")).unwrap();
        let graph = one_task_graph();
        let task_id = TaskId::from("T1");
        manager.create_task(task_id.clone()).unwrap();

        manager.claim_task(&graph, &task_id, WorkerId(0)).unwrap();
        let outcome = manager
            .fail_task(&task_id, Some("boom".into()), 2)
            .unwrap()
            .unwrap();
        assert_eq!(outcome, FailureOutcome::RetryPending);
        assert_eq!(manager.get_task(&task_id).unwrap().status, TaskStatus::Pending);
        assert_eq!(manager.get_task(&task_id).unwrap().retry_count, 1);

        manager.claim_task(&graph, &task_id, WorkerId(1)).unwrap();
        let outcome = manager
            .fail_task(&task_id, Some("boom again".into()), 2)
            .unwrap()
            .unwrap();
        assert_eq!(outcome, FailureOutcome::Blocked);
        assert_eq!(manager.get_task(&task_id).unwrap().status, TaskStatus::Blocked);
    }

    #[test]
    fn block_task_skips_retry_entirely() {
        let dir = tempfile::tempdir().unwrap();
        let manager =
            StateManager::open_or_restore("demo", dir.path().join("state.json")).unwrap();
        let graph = one_task_graph();
        let task_id = TaskId::from("T1");
        manager.create_task(task_id.clone()).unwrap();
        manager.claim_task(&graph, &task_id, WorkerId(0)).unwrap();

        assert!(manager.block_task(&task_id, Some("protocol violation".into())).unwrap());
        let record = manager.get_task(&task_id).unwrap();
        assert_eq!(record.status, TaskStatus::Blocked);
        assert_eq!(record.retry_count, 0);
    }
}
