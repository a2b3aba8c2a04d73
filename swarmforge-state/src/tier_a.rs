//! Tier A: the in-process authoritative task registry.
//!
//! All mutation flows through a single `parking_lot::Mutex`, giving the
//! single-writer discipline spec.md §4.2/§5 require: two callers racing to
//! claim the same task can never both win.

use chrono::Utc;
use std::collections::HashMap;
use std::path::PathBuf;
use swarmforge_types::{
    FeatureState, Heartbeat, LevelRecord, TaskGraph, TaskId, TaskRecord, TaskStatus, Worker,
    WorkerId, WorkerStatus,
};

/// Result of a recoverable-failure transition (spec.md §3 TaskStatus
/// transitions): either the task returns to `PENDING` for redispatch or it
/// has exhausted its retries and is now `BLOCKED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    RetryPending,
    Blocked,
}

pub struct TaskRegistry {
    state: parking_lot::Mutex<FeatureState>,
}

impl TaskRegistry {
    pub fn new(feature_id: impl Into<String>) -> Self {
        Self {
            state: parking_lot::Mutex::new(FeatureState::new(feature_id)),
        }
    }

    pub fn from_state(state: FeatureState) -> Self {
        Self {
            state: parking_lot::Mutex::new(state),
        }
    }

    /// Idempotent: a task already registered keeps its current status
    /// (spec.md §4.6 "Register every task ... idempotent on resume").
    pub fn create_task(&self, task_id: TaskId) {
        let mut state = self.state.lock();
        state.tasks.entry(task_id).or_insert_with(TaskRecord::pending);
    }

    pub fn update_task_status(
        &self,
        task_id: &TaskId,
        status: TaskStatus,
        error: Option<String>,
    ) -> bool {
        let mut state = self.state.lock();
        let Some(record) = state.tasks.get_mut(task_id) else {
            return false;
        };
        if !record.status.can_transition_to(status) {
            return false;
        }

        record.status = status;
        if let Some(error) = error {
            record.last_error = Some(error);
        }
        match status {
            TaskStatus::InProgress if record.started_at.is_none() => {
                record.started_at = Some(Utc::now());
            }
            TaskStatus::Completed | TaskStatus::Blocked => {
                record.finished_at = Some(Utc::now());
            }
            TaskStatus::Pending => {
                record.assigned_worker_id = None;
            }
            _ => {}
        }
        true
    }

    /// Atomic claim: succeeds only if the task is `PENDING` and every
    /// dependency is `COMPLETED` (spec.md §4.2 "Atomic claim"). A `PAUSED`
    /// task (mid-checkpoint, spec.md §3 `PAUSED -> IN_PROGRESS` on resume)
    /// is claimable the same way — its dependencies were already satisfied
    /// when it was first claimed, so the check below is redundant but
    /// harmless for that case.
    pub fn claim_task(&self, graph: &TaskGraph, task_id: &TaskId, worker_id: WorkerId) -> bool {
        let mut state = self.state.lock();

        let deps_completed = match graph.get(task_id) {
            Some(task) => task.dependencies.iter().all(|dep| {
                state
                    .tasks
                    .get(dep)
                    .map(|r| r.status == TaskStatus::Completed)
                    .unwrap_or(false)
            }),
            None => return false,
        };
        if !deps_completed {
            return false;
        }

        let Some(record) = state.tasks.get_mut(task_id) else {
            return false;
        };
        if !matches!(record.status, TaskStatus::Pending | TaskStatus::Paused) {
            return false;
        }

        record.status = TaskStatus::InProgress;
        record.assigned_worker_id = Some(worker_id);
        if record.started_at.is_none() {
            record.started_at = Some(Utc::now());
        }
        true
    }

    /// A recoverable verification failure (spec.md §4.3 step 7, §7
    /// `TASK_VERIFICATION_FAILED`): `IN_PROGRESS -> FAILED`, then either
    /// `-> PENDING` with `retry_count` incremented (retries remain) or
    /// `-> BLOCKED` (retries exhausted).
    pub fn fail_task(
        &self,
        task_id: &TaskId,
        error: Option<String>,
        max_retries: u32,
    ) -> Option<FailureOutcome> {
        let mut state = self.state.lock();
        let record = state.tasks.get_mut(task_id)?;
        if record.status != TaskStatus::InProgress {
            return None;
        }

        record.status = TaskStatus::Failed;
        if let Some(error) = error {
            record.last_error = Some(error);
        }
        record.retry_count += 1;

        if record.retry_count >= max_retries {
            record.status = TaskStatus::Blocked;
            record.finished_at = Some(Utc::now());
            Some(FailureOutcome::Blocked)
        } else {
            record.status = TaskStatus::Pending;
            record.assigned_worker_id = None;
            record.started_at = None;
            Some(FailureOutcome::RetryPending)
        }
    }

    /// A non-retryable failure (spec.md §7 `TASK_PROTOCOL_VIOLATION`,
    /// `DEPENDENCY_MISSING`, `AMBIGUOUS_SPEC`): `IN_PROGRESS -> FAILED ->
    /// BLOCKED` in one step, bypassing the retry count entirely.
    pub fn block_task(&self, task_id: &TaskId, error: Option<String>) -> bool {
        let mut state = self.state.lock();
        let Some(record) = state.tasks.get_mut(task_id) else {
            return false;
        };
        if record.status != TaskStatus::InProgress {
            return false;
        }
        record.status = TaskStatus::Blocked;
        if let Some(error) = error {
            record.last_error = Some(error);
        }
        record.finished_at = Some(Utc::now());
        true
    }

    /// Operator-initiated retry (control operation `retry`, spec.md §6):
    /// forces a `BLOCKED`/`FAILED` task back to `PENDING` outside the normal
    /// transition table, since no worker is holding the claim anymore.
    /// `reset_counter` clears `retry_count` so the task gets a fresh budget.
    pub fn force_reset_task(&self, task_id: &TaskId, reset_counter: bool) -> bool {
        let mut state = self.state.lock();
        let Some(record) = state.tasks.get_mut(task_id) else {
            return false;
        };
        if !matches!(record.status, TaskStatus::Blocked | TaskStatus::Failed) {
            return false;
        }
        record.status = TaskStatus::Pending;
        record.assigned_worker_id = None;
        record.started_at = None;
        record.finished_at = None;
        if reset_counter {
            record.retry_count = 0;
        }
        true
    }

    /// Health-monitor-triggered requeue (spec.md §4.4): a stalled worker's
    /// in-flight task goes straight back to `PENDING` regardless of the
    /// verification retry budget — this is not a verification failure, so
    /// `retry_count` is left untouched.
    pub fn requeue_stalled_task(&self, task_id: &TaskId) -> bool {
        let mut state = self.state.lock();
        let Some(record) = state.tasks.get_mut(task_id) else {
            return false;
        };
        if record.status != TaskStatus::InProgress {
            return false;
        }
        record.status = TaskStatus::Pending;
        record.assigned_worker_id = None;
        record.started_at = None;
        true
    }

    pub fn get_task(&self, task_id: &TaskId) -> Option<TaskRecord> {
        self.state.lock().tasks.get(task_id).cloned()
    }

    pub fn list_tasks(&self) -> HashMap<TaskId, TaskRecord> {
        self.state.lock().tasks.clone()
    }

    pub fn get_worker(&self, worker_id: WorkerId) -> Option<Worker> {
        self.state.lock().workers.get(&worker_id).cloned()
    }

    pub fn list_workers(&self) -> HashMap<WorkerId, Worker> {
        self.state.lock().workers.clone()
    }

    /// Register a worker's worktree/branch at startup (spec.md §4.6 startup
    /// step 4); idempotent so resume does not clobber an already-known
    /// worker's runtime fields.
    pub fn ensure_worker(&self, worker_id: WorkerId, worktree: PathBuf, branch: String) {
        self.state
            .lock()
            .workers
            .entry(worker_id)
            .or_insert_with(|| Worker::new(worker_id, worktree, branch));
    }

    pub fn update_worker_status(&self, worker_id: WorkerId, status: WorkerStatus) {
        if let Some(worker) = self.state.lock().workers.get_mut(&worker_id) {
            worker.status = status;
        }
    }

    pub fn update_worker_task(&self, worker_id: WorkerId, task_id: Option<TaskId>) {
        if let Some(worker) = self.state.lock().workers.get_mut(&worker_id) {
            worker.current_task_id = task_id;
        }
    }

    pub fn record_worker_heartbeat(&self, heartbeat: &Heartbeat, worktree: std::path::PathBuf, branch: String) {
        let mut state = self.state.lock();
        let worker = state
            .workers
            .entry(heartbeat.worker_id)
            .or_insert_with(|| Worker::new(heartbeat.worker_id, worktree, branch));
        worker.last_heartbeat_at = heartbeat.timestamp;
        worker.current_task_id = heartbeat.task_id.clone();
    }

    pub fn update_level_status(&self, level: u32, record: LevelRecord) {
        self.state.lock().levels.insert(level, record);
    }

    pub fn set_current_level(&self, level: u32) {
        self.state.lock().current_level = level;
    }

    pub fn snapshot(&self) -> FeatureState {
        self.state.lock().clone()
    }

    pub fn restore(&self, snapshot: FeatureState) {
        *self.state.lock() = snapshot;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use swarmforge_types::{Level, LevelIndex, Task, TaskFiles, Verification};

    fn graph_with_dependency() -> TaskGraph {
        let dep_free = Task {
            id: TaskId::from("T0"),
            title: "t0".into(),
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
        let dependent = Task {
            id: TaskId::from("T1"),
            title: "t1".into(),
            description: String::new(),
            level: 2,
            dependencies: [TaskId::from("T0")].into_iter().collect(),
            files: TaskFiles::default(),
            verification: Verification {
                command: "true".into(),
                timeout_seconds: 10,
            },
            integration_test: None,
            estimate_minutes: None,
        };
        let mut tasks = HashMap::new();
        tasks.insert(dep_free.id.clone(), dep_free);
        tasks.insert(dependent.id.clone(), dependent);
        TaskGraph {
            feature_id: "demo".into(),
            tasks,
            levels: vec![
                Level {
                    level_index: LevelIndex(1),
                    tasks: [TaskId::from("T0")].into_iter().collect(),
                },
                Level {
                    level_index: LevelIndex(2),
                    tasks: [TaskId::from("T1")].into_iter().collect(),
                },
            ],
        }
    }

    #[test]
    fn claim_blocked_until_dependency_completes() {
        let registry = TaskRegistry::new("demo");
        registry.create_task(TaskId::from("T0"));
        registry.create_task(TaskId::from("T1"));
        let graph = graph_with_dependency();

        assert!(!registry.claim_task(&graph, &TaskId::from("T1"), WorkerId(0)));

        assert!(registry.claim_task(&graph, &TaskId::from("T0"), WorkerId(0)));
        registry.update_task_status(&TaskId::from("T0"), TaskStatus::Completed, None);

        assert!(registry.claim_task(&graph, &TaskId::from("T1"), WorkerId(1)));
    }

    #[test]
    fn requeue_stalled_task_clears_assignment_without_touching_retry_count() {
        let registry = TaskRegistry::new("demo");
        registry.create_task(TaskId::from("T0"));
        let graph = graph_with_dependency();
        registry.claim_task(&graph, &TaskId::from("T0"), WorkerId(0));

        assert!(registry.requeue_stalled_task(&TaskId::from("T0")));
        let record = registry.get_task(&TaskId::from("T0")).unwrap();
        assert_eq!(record.status, TaskStatus::Pending);
        assert!(record.assigned_worker_id.is_none());
        assert_eq!(record.retry_count, 0);
    }

    #[test]
    fn force_reset_requires_blocked_or_failed_status() {
        let registry = TaskRegistry::new("demo");
        registry.create_task(TaskId::from("T0"));
        // Still PENDING: not eligible for an operator-forced reset.
        assert!(!registry.force_reset_task(&TaskId::from("T0"), true));

        let graph = graph_with_dependency();
        registry.claim_task(&graph, &TaskId::from("T0"), WorkerId(0));
        registry.block_task(&TaskId::from("T0"), Some("bad".into()));

        assert!(registry.force_reset_task(&TaskId::from("T0"), true));
        let record = registry.get_task(&TaskId::from("T0")).unwrap();
        assert_eq!(record.status, TaskStatus::Pending);
        assert_eq!(record.retry_count, 0);
    }
}
