//! Dispatches one worker's task attempt onto a blocking thread.
//!
//! [`swarmforge_worker::execute_task`] holds a `&git2::Repository` across
//! `.await` points (subprocess spawns, heartbeat writes) and `Repository` is
//! not `Send`, so it cannot be awaited directly from the scheduler's async
//! task. Each attempt instead runs inside `spawn_blocking`, opens its own
//! `Repository::open` there, and drives `execute_task` to completion with
//! `Handle::block_on` — the same "open a fresh handle per call" shape
//! `swarmforge-merge`'s `VcsBackend` uses for its own git2 operations, just
//! combined with `block_on` because `execute_task` is async.

use crate::context_usage::read_context_usage;
use std::path::PathBuf;
use std::sync::Arc;
use swarmforge_state::StateManager;
use swarmforge_types::{TaskGraph, TaskId, WorkerId};
use swarmforge_worker::{
    ExecutionConfig, HeartbeatPublisher, TaskOutcome, WorkerError, WorkerProcess,
};

/// Everything one attempt needs, bundled so the call site doesn't have to
/// juggle a dozen positional arguments across the `spawn_blocking` boundary.
pub struct AttemptRequest {
    pub state: Arc<StateManager>,
    pub graph: Arc<TaskGraph>,
    pub task_id: TaskId,
    pub worker_id: WorkerId,
    pub feature_id: String,
    pub repo_path: PathBuf,
    pub worktree: PathBuf,
    pub process: Arc<dyn WorkerProcess>,
    pub state_dir: PathBuf,
    pub config: ExecutionConfig,
}

/// What the scheduler learns once an attempt finishes (or fails to run at
/// all — a `WorkerError` here means the attempt itself errored, distinct
/// from `TaskOutcome::Blocked`/`RetryPending`, which are successful runs of
/// a failing task).
pub struct AttemptResult {
    pub task_id: TaskId,
    pub worker_id: WorkerId,
    pub outcome: Result<TaskOutcome, WorkerError>,
}

/// Spawn one task-execution attempt. Returns immediately; the caller selects
/// on the returned handle alongside health and stop signals.
pub fn spawn_attempt(req: AttemptRequest) -> tokio::task::JoinHandle<AttemptResult> {
    let handle = tokio::runtime::Handle::current();

    tokio::task::spawn_blocking(move || {
        let task_id = req.task_id.clone();
        let worker_id = req.worker_id;

        let outcome = (|| -> Result<TaskOutcome, WorkerError> {
            let repo = git2::Repository::open(&req.repo_path)?;
            let heartbeats = HeartbeatPublisher::new(req.worker_id, &req.state_dir);
            let worktree = req.worktree.clone();
            let context_usage = move || read_context_usage(&worktree);

            handle.block_on(swarmforge_worker::execute_task(
                &req.state,
                &req.graph,
                &req.task_id,
                req.worker_id,
                &req.feature_id,
                &repo,
                &req.worktree,
                req.process.as_ref(),
                &heartbeats,
                &req.config,
                &context_usage,
            ))
        })();

        AttemptResult {
            task_id,
            worker_id,
            outcome,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::NoopAgentProcess;
    use std::collections::HashMap;
    use swarmforge_types::{Level, LevelIndex, Task, TaskFiles, Verification};

    fn init_repo(dir: &std::path::Path) -> git2::Repository {
        let repo = git2::Repository::init(dir).unwrap();
        let mut config = repo.config().unwrap();
        config.set_str("user.name", "test").unwrap();
        config.set_str("user.email", "test@example.com").unwrap();
        drop(config);
        std::fs::write(dir.join("README.md"), "hi").unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(std::path::Path::new("README.md")).unwrap();
        let tree_oid = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_oid).unwrap();
        let sig = repo.signature().unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "init", &tree, &[]).unwrap();
        repo
    }

    #[tokio::test]
    async fn spawn_attempt_drives_execute_task_to_completion() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());

        let task = Task {
            id: TaskId::from("T1"),
            title: "t".into(),
            description: String::new(),
            level: 1,
            dependencies: Default::default(),
            files: TaskFiles {
                create: vec![],
                modify: vec![],
                read: vec![],
            },
            verification: Verification {
                command: "true".into(),
                timeout_seconds: 5,
            },
            integration_test: None,
            estimate_minutes: None,
        };
        let mut tasks = HashMap::new();
        tasks.insert(task.id.clone(), task.clone());
        let graph = Arc::new(TaskGraph {
            feature_id: "demo".into(),
            tasks,
            levels: vec![Level {
                level_index: LevelIndex(1),
                tasks: [task.id.clone()].into_iter().collect(),
            }],
        });

        let state_dir = dir.path().join("state");
        std::fs::create_dir_all(&state_dir).unwrap();
        let state = Arc::new(
            StateManager::open_or_restore("demo", state_dir.join("state.json")).unwrap(),
        );
        state.create_task(task.id.clone()).unwrap();

        let req = AttemptRequest {
            state: state.clone(),
            graph,
            task_id: task.id.clone(),
            worker_id: WorkerId(0),
            feature_id: "demo".into(),
            repo_path: dir.path().to_path_buf(),
            worktree: dir.path().to_path_buf(),
            process: Arc::new(NoopAgentProcess),
            state_dir,
            config: ExecutionConfig::default(),
        };

        let result = spawn_attempt(req).await.unwrap();
        assert_eq!(result.task_id, task.id);
        assert!(matches!(result.outcome, Ok(TaskOutcome::Completed)));
        assert_eq!(
            state.get_task(&task.id).unwrap().status,
            swarmforge_types::TaskStatus::Completed
        );
    }
}
