//! `Orchestrator`: the level-synchronous scheduler (spec.md §4.6) that ties
//! every other `swarmforge-*` crate into one control surface.

use crate::context_usage::CONTEXT_USAGE_FILENAME;
use crate::error::OrchestratorError;
use crate::escalations::EscalationLog;
use crate::health_bridge::StateHeartbeatSource;
use crate::pool::{spawn_attempt, AttemptRequest, AttemptResult};
use crate::worktree::{ensure_worker_worktree, recreate_worker_worktree, worker_branch_name};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use swarmforge_health::{HealthEvent, HealthMonitor, HealthMonitorConfig};
use swarmforge_hooks::{HookRegistry, LifecycleEvent, QualityGate, TaskOutcomeKind};
use swarmforge_merge::{MergeCoordinator, MergeOutcome, MergeRequest, VcsBackend, WorkerBranch};
use swarmforge_state::StateManager;
use swarmforge_types::{
    LevelRecord, LevelStatus, RawTaskGraph, TaskGraph, TaskId, TaskStatus, WorkerId,
    WorkerStatus,
};
use swarmforge_worker::{ExecutionConfig, TaskOutcome, WorkerError, WorkerProcess};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// `run(feature, worker_count, mode)` (spec.md §6). `mode` is folded into
/// the constructor's process/gate wiring rather than a flag here — a
/// diagnostic run is simply one built with `NoopAgentProcess`.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub worker_count: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct StopOptions {
    pub graceful: bool,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub enum RetryTarget {
    Task(TaskId),
    Level(u32),
    All,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RetryOptions {
    pub reset_counter: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MergeOptions {
    pub force: bool,
    pub skip_gates: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CleanupOptions {
    pub keep_branches: bool,
    pub dry_run: bool,
}

#[derive(Debug)]
pub enum RunOutcome {
    Completed,
    Paused { level: u32 },
}

/// Everything the scheduler needs placed on disk/VCS before its loop can
/// run (spec.md §4.6 startup steps 2-4 take a repo path, a worktree root,
/// and a state directory as inputs).
pub struct Orchestrator {
    feature_id: String,
    graph: Arc<TaskGraph>,
    state: Arc<StateManager>,
    config: crate::config::OrchestratorConfig,
    repo_path: PathBuf,
    worktree_root: PathBuf,
    state_dir: PathBuf,
    process: Arc<dyn WorkerProcess>,
    gates: Vec<Arc<dyn QualityGate>>,
    hooks: HookRegistry,
    escalations: EscalationLog,
    stop_requested: Arc<AtomicBool>,
    force_stop: Arc<AtomicBool>,
}

impl Orchestrator {
    /// Validates `raw` (spec.md §4.6 startup step 1) and opens/restores
    /// feature state (step 2) before returning. Worktree preparation (step
    /// 4) and task registration (step 5) happen in [`run`]/[`resume`],
    /// since only those know the worker count.
    pub fn new(
        feature_id: impl Into<String>,
        raw: RawTaskGraph,
        repo_path: impl Into<PathBuf>,
        worktree_root: impl Into<PathBuf>,
        state_dir: impl Into<PathBuf>,
        config: crate::config::OrchestratorConfig,
        process: Arc<dyn WorkerProcess>,
        gates: Vec<Arc<dyn QualityGate>>,
        hooks: HookRegistry,
    ) -> Result<Self, OrchestratorError> {
        let feature_id = feature_id.into();
        let graph =
            swarmforge_graph::validate(raw).map_err(swarmforge_graph::GraphInvalid)?;
        let state_dir = state_dir.into();
        let state = StateManager::open_or_restore(feature_id.clone(), state_dir.join("state.json"))?;
        let escalations = EscalationLog::new(&state_dir);

        Ok(Self {
            feature_id,
            graph: Arc::new(graph),
            state: Arc::new(state),
            config,
            repo_path: repo_path.into(),
            worktree_root: worktree_root.into(),
            state_dir,
            process,
            gates,
            hooks,
            escalations,
            stop_requested: Arc::new(AtomicBool::new(false)),
            force_stop: Arc::new(AtomicBool::new(false)),
        })
    }

    fn worker_count_for(&self, requested: usize) -> usize {
        requested
            .min(self.graph.max_parallelization().max(1))
            .min(self.config.max_count)
            .max(1)
    }

    /// spec.md §6 `run(feature, worker_count, mode)`.
    pub async fn run(&self, opts: RunOptions) -> Result<RunOutcome, OrchestratorError> {
        for task in self.graph.tasks.values() {
            self.state.create_task(task.id.clone())?;
        }
        let n = self.worker_count_for(opts.worker_count);
        self.prepare_worktrees(n, false).await?;
        self.execute(n).await
    }

    /// spec.md §6 `resume(feature)`: reuses whatever worker set was
    /// persisted by the prior run, re-creating any worktree left behind by
    /// an unclean shutdown.
    pub async fn resume(&self) -> Result<RunOutcome, OrchestratorError> {
        let workers = self.state.list_workers();
        if workers.is_empty() {
            return Err(OrchestratorError::NothingToResume);
        }
        let n = workers.len();
        self.prepare_worktrees(n, true).await?;
        self.execute(n).await
    }

    async fn prepare_worktrees(&self, n: usize, resuming: bool) -> Result<(), OrchestratorError> {
        for i in 0..n {
            let worker_id = WorkerId(i as u32);
            let repo_path = self.repo_path.clone();
            let feature_id = self.feature_id.clone();
            let base_branch = self.config.base_branch.clone();
            let worktree_root = self.worktree_root.clone();

            let (worktree, branch) = tokio::task::spawn_blocking(move || {
                let repo = git2::Repository::open(&repo_path)?;
                ensure_worker_worktree(&repo, &feature_id, worker_id, &base_branch, &worktree_root)
            })
            .await
            .expect("prepare_worktrees task panicked")?;

            self.state.ensure_worker(worker_id, worktree.clone(), branch.clone());
            if !resuming {
                self.hooks
                    .dispatch(LifecycleEvent::WorkerSpawned {
                        feature_id: self.feature_id.clone(),
                        worker_id,
                        branch,
                        at: Utc::now(),
                    })
                    .await;
            }
        }
        Ok(())
    }

    async fn execute(&self, n: usize) -> Result<RunOutcome, OrchestratorError> {
        self.hooks
            .dispatch(LifecycleEvent::ExecutionStarted {
                feature_id: self.feature_id.clone(),
                worker_count: n,
                at: Utc::now(),
            })
            .await;

        let (health_tx, mut health_rx) = mpsc::channel(256);
        let monitor = HealthMonitor::new(HealthMonitorConfig {
            stall_threshold_secs: self.config.stall_threshold_secs,
            max_auto_restarts: self.config.max_auto_restarts,
        });
        let source: Arc<dyn swarmforge_health::HeartbeatSource> =
            Arc::new(StateHeartbeatSource::new(Arc::clone(&self.state)));
        let worker_ids: Vec<WorkerId> = (0..n as u32).map(WorkerId).collect();
        let health_task = tokio::spawn(swarmforge_health::watch::run(
            monitor,
            source,
            move || worker_ids.clone(),
            self.config.health_poll_interval_secs,
            health_tx,
        ));

        let mut level = self.state.snapshot().current_level.max(1);
        let max_level = self.graph.max_level();
        let mut outcome = RunOutcome::Completed;

        while level <= max_level {
            let already_merged = matches!(
                self.state
                    .snapshot()
                    .levels
                    .get(&level)
                    .and_then(|l| l.status),
                Some(LevelStatus::Merged)
            );
            if already_merged {
                level += 1;
                continue;
            }

            match self.run_level(level, n, &mut health_rx).await? {
                Some(()) => {
                    self.state.advance_level(level + 1)?;
                    level += 1;
                }
                None => {
                    outcome = RunOutcome::Paused { level };
                    break;
                }
            }
        }

        health_task.abort();
        self.hooks
            .dispatch(LifecycleEvent::ExecutionFinished {
                feature_id: self.feature_id.clone(),
                succeeded: matches!(outcome, RunOutcome::Completed),
                at: Utc::now(),
            })
            .await;

        Ok(outcome)
    }

    /// Run one level to a terminal state and merge it. Returns `Ok(Some(()))`
    /// on promotion, `Ok(None)` if the level paused (`LEVEL_FAILED`).
    async fn run_level(
        &self,
        level: u32,
        n: usize,
        health_rx: &mut mpsc::Receiver<HealthEvent>,
    ) -> Result<Option<()>, OrchestratorError> {
        self.state
            .update_level_status(level, LevelRecord { status: Some(LevelStatus::Running), merge_commit: None })?;

        let mut in_flight: JoinSet<AttemptResult> = JoinSet::new();
        let mut abort_handles: HashMap<WorkerId, tokio::task::AbortHandle> = HashMap::new();
        let mut busy: HashSet<WorkerId> = HashSet::new();
        let mut terminated: HashSet<WorkerId> = HashSet::new();
        let mut started_at: HashMap<TaskId, chrono::DateTime<Utc>> = HashMap::new();

        loop {
            self.dispatch_idle_workers(level, n, &mut busy, &terminated, &mut in_flight, &mut abort_handles, &mut started_at)
                .await?;

            if self.level_is_terminal(level) && in_flight.is_empty() {
                break;
            }

            if self.force_stop.load(Ordering::SeqCst) {
                for handle in abort_handles.values() {
                    handle.abort();
                }
                for task_id in started_at.keys() {
                    self.state.update_task_status(task_id, TaskStatus::Failed, Some("forced stop".into()))?;
                }
                return Ok(None);
            }

            tokio::select! {
                Some(res) = in_flight.join_next(), if !in_flight.is_empty() => {
                    let result = res.map_err(|e| OrchestratorError::State(
                        swarmforge_state::StateError::Corrupt { path: "in-flight attempt".into(), detail: e.to_string() }
                    ))?;
                    abort_handles.remove(&result.worker_id);
                    busy.remove(&result.worker_id);
                    self.handle_attempt_result(level, result, &mut started_at).await?;
                }
                Some(event) = health_rx.recv() => {
                    self.handle_health_event(event, &mut busy, &mut abort_handles, &mut terminated).await?;
                }
                else => {
                    if in_flight.is_empty() {
                        // Nothing in flight and the level isn't terminal yet:
                        // no eligible task exists right now (all remaining
                        // tasks are waiting on a dependency). Back off briefly.
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                }
            }
        }

        self.merge_level(level).await
    }

    #[allow(clippy::too_many_arguments)]
    async fn dispatch_idle_workers(
        &self,
        level: u32,
        n: usize,
        busy: &mut HashSet<WorkerId>,
        terminated: &HashSet<WorkerId>,
        in_flight: &mut JoinSet<AttemptResult>,
        abort_handles: &mut HashMap<WorkerId, tokio::task::AbortHandle>,
        started_at: &mut HashMap<TaskId, chrono::DateTime<Utc>>,
    ) -> Result<(), OrchestratorError> {
        for i in 0..n as u32 {
            let worker_id = WorkerId(i);
            if busy.contains(&worker_id) || terminated.contains(&worker_id) {
                continue;
            }
            let Some(task_id) = self.next_eligible_task(level) else {
                continue;
            };
            let Some(worker) = self.state.get_worker(worker_id) else {
                continue;
            };

            let req = AttemptRequest {
                state: Arc::clone(&self.state),
                graph: Arc::clone(&self.graph),
                task_id: task_id.clone(),
                worker_id,
                feature_id: self.feature_id.clone(),
                repo_path: worker.worktree.clone(),
                worktree: worker.worktree.clone(),
                process: Arc::clone(&self.process),
                state_dir: self.state_dir.clone(),
                config: ExecutionConfig {
                    max_retries: self.config.max_retries,
                    syntax_command: self.config.syntax_command.clone(),
                    quality_command: self.config.quality_command.clone(),
                },
            };

            busy.insert(worker_id);
            started_at.insert(task_id.clone(), Utc::now());
            self.state.update_worker_status(worker_id, WorkerStatus::Running);
            self.state.update_worker_task(worker_id, Some(task_id.clone()));

            self.hooks
                .dispatch(LifecycleEvent::TaskStarted {
                    feature_id: self.feature_id.clone(),
                    task_id: task_id.clone(),
                    worker_id,
                    level,
                    at: Utc::now(),
                })
                .await;

            let handle = in_flight.spawn(async move {
                spawn_attempt(req).await.unwrap_or_else(|join_err| AttemptResult {
                    task_id: TaskId::from(""),
                    worker_id,
                    outcome: Err(WorkerError::Io(std::io::Error::new(
                        std::io::ErrorKind::Other,
                        join_err,
                    ))),
                })
            });
            abort_handles.insert(worker_id, handle);
        }
        Ok(())
    }

    /// Worktrees double as each worker's isolated repository handle in this
    /// implementation (one linked worktree per worker, spec.md §5
    /// "Exclusive access per worker through isolated worktrees"), so
    /// `repo_path` passed to an attempt is the worktree path itself —
    /// `git2::Repository::open` resolves a linked worktree's `.git` file
    /// back to the common repository transparently.
    fn next_eligible_task(&self, level: u32) -> Option<TaskId> {
        self.graph
            .tasks_at_level(level)
            .filter(|t| {
                self.state
                    .get_task(&t.id)
                    .map(|r| matches!(r.status, TaskStatus::Pending | TaskStatus::Paused))
                    .unwrap_or(false)
            })
            .find(|t| {
                t.dependencies.iter().all(|dep| {
                    self.state
                        .get_task(dep)
                        .map(|r| r.status == TaskStatus::Completed)
                        .unwrap_or(false)
                })
            })
            .map(|t| t.id.clone())
    }

    fn level_is_terminal(&self, level: u32) -> bool {
        self.graph.tasks_at_level(level).all(|t| {
            self.state
                .get_task(&t.id)
                .map(|r| r.status.is_terminal_for_level())
                .unwrap_or(false)
        })
    }

    async fn handle_attempt_result(
        &self,
        level: u32,
        result: AttemptResult,
        started_at: &mut HashMap<TaskId, chrono::DateTime<Utc>>,
    ) -> Result<(), OrchestratorError> {
        let task_id = result.task_id;
        let worker_id = result.worker_id;
        let start = started_at.remove(&task_id).unwrap_or_else(Utc::now);
        let duration_ms = (Utc::now() - start).num_milliseconds();

        self.state.update_worker_status(worker_id, WorkerStatus::Idle);
        self.state.update_worker_task(worker_id, None);

        let (kind, escalation_category) = match result.outcome {
            Ok(TaskOutcome::Completed) => (TaskOutcomeKind::Completed, None),
            Ok(TaskOutcome::RetryPending) => (TaskOutcomeKind::RetryPending, None),
            Ok(TaskOutcome::Blocked { escalation }) => {
                let category = escalation.as_ref().map(|e| e.category);
                if let Some(escalation) = &escalation {
                    self.escalations.append(escalation)?;
                }
                (TaskOutcomeKind::Blocked, category)
            }
            Ok(TaskOutcome::Checkpoint { .. }) => (TaskOutcomeKind::Checkpoint, None),
            Err(err) => {
                tracing::warn!(%task_id, %worker_id, %err, "worker attempt errored, requeuing for retry");
                self.state.fail_task(&task_id, Some(err.to_string()), self.config.max_retries)?;
                (TaskOutcomeKind::RetryPending, None)
            }
        };

        self.hooks
            .dispatch(LifecycleEvent::TaskCompleted {
                feature_id: self.feature_id.clone(),
                task_id,
                worker_id,
                level,
                outcome: kind,
                escalation_category,
                duration_ms,
                at: Utc::now(),
            })
            .await;
        Ok(())
    }

    async fn handle_health_event(
        &self,
        event: HealthEvent,
        busy: &mut HashSet<WorkerId>,
        abort_handles: &mut HashMap<WorkerId, tokio::task::AbortHandle>,
        terminated: &mut HashSet<WorkerId>,
    ) -> Result<(), OrchestratorError> {
        match event {
            HealthEvent::Stalled { worker_id, task_id, restart_attempt } => {
                tracing::warn!(%worker_id, restart_attempt, "restarting stalled worker");
                if let Some(handle) = abort_handles.remove(&worker_id) {
                    handle.abort();
                }
                busy.remove(&worker_id);
                if let Some(task_id) = task_id {
                    self.state.requeue_stalled_task(&task_id)?;
                }
            }
            HealthEvent::RestartsExhausted { worker_id, task_id } => {
                tracing::error!(%worker_id, "worker exhausted restart budget, terminating");
                if let Some(handle) = abort_handles.remove(&worker_id) {
                    handle.abort();
                }
                busy.remove(&worker_id);
                terminated.insert(worker_id);
                self.state.update_worker_status(worker_id, WorkerStatus::Crashed);
                if let Some(task_id) = task_id {
                    self.state.requeue_stalled_task(&task_id)?;
                }
            }
        }
        Ok(())
    }

    async fn merge_level(&self, level: u32) -> Result<Option<()>, OrchestratorError> {
        self.state.update_level_status(
            level,
            LevelRecord { status: Some(LevelStatus::GatesRunning), merge_commit: None },
        )?;

        let vcs = VcsBackend::new(&self.repo_path);
        let coordinator = MergeCoordinator::new(vcs, self.gates.clone());

        let worker_branches: Vec<WorkerBranch> = self
            .state
            .list_workers()
            .keys()
            .map(|&worker_id| WorkerBranch {
                worker_id,
                branch_name: worker_branch_name(&self.feature_id, worker_id),
            })
            .collect();

        let req = MergeRequest {
            feature_id: self.feature_id.clone(),
            level,
            base_branch: self.config.base_branch.clone(),
            worker_branches,
            force: false,
            skip_gates: self.gates.is_empty(),
        };

        match coordinator.merge_level(&self.state, &self.graph, req).await? {
            MergeOutcome::Promoted { merge_commit, tag, needs_rebase, .. } => {
                self.state.update_level_status(
                    level,
                    LevelRecord { status: Some(LevelStatus::Merged), merge_commit: Some(merge_commit.to_string()) },
                )?;
                self.hooks
                    .dispatch(LifecycleEvent::MergeComplete {
                        feature_id: self.feature_id.clone(),
                        level,
                        merge_commit: merge_commit.to_string(),
                        tag,
                        at: Utc::now(),
                    })
                    .await;
                self.hooks
                    .dispatch(LifecycleEvent::LevelComplete {
                        feature_id: self.feature_id.clone(),
                        level,
                        merged: true,
                        at: Utc::now(),
                    })
                    .await;

                for worker_id in needs_rebase {
                    let repo_path = self.repo_path.clone();
                    let feature_id = self.feature_id.clone();
                    let base_branch = self.config.base_branch.clone();
                    let worktree_root = self.worktree_root.clone();
                    let (worktree, branch) = tokio::task::spawn_blocking(move || {
                        let repo = git2::Repository::open(&repo_path)?;
                        recreate_worker_worktree(&repo, &feature_id, worker_id, &base_branch, &worktree_root)
                    })
                    .await
                    .expect("worktree recreation task panicked")?;
                    self.state.update_worker_status(worker_id, WorkerStatus::Idle);
                    let _ = (worktree, branch); // ensure_worker already seeded these paths at startup
                }
                Ok(Some(()))
            }
            MergeOutcome::LevelFailed(failure) => {
                self.state.update_level_status(
                    level,
                    LevelRecord { status: Some(LevelStatus::Failed), merge_commit: None },
                )?;
                self.hooks
                    .dispatch(LifecycleEvent::LevelComplete {
                        feature_id: self.feature_id.clone(),
                        level,
                        merged: false,
                        at: Utc::now(),
                    })
                    .await;
                tracing::error!(level, ?failure, "level failed to merge");
                Ok(None)
            }
        }
    }

    /// spec.md §6 `stop(feature, {graceful, force}, timeout)`. Graceful stop
    /// lets in-flight attempts reach their own checkpoint/completion within
    /// `timeout` before the next poll forces them; force skips straight to
    /// aborting and failing in-flight tasks.
    pub async fn stop(&self, opts: StopOptions) {
        self.stop_requested.store(true, Ordering::SeqCst);
        if !opts.graceful {
            self.force_stop.store(true, Ordering::SeqCst);
            return;
        }
        tokio::time::sleep(opts.timeout).await;
        self.force_stop.store(true, Ordering::SeqCst);
    }

    /// spec.md §6 `retry(task_id | level | all, {force, reset_counter, ...})`.
    pub fn retry(&self, target: RetryTarget, opts: RetryOptions) -> Result<usize, OrchestratorError> {
        let mut count = 0;
        match target {
            RetryTarget::Task(task_id) => {
                if self.state.force_reset_task(&task_id, opts.reset_counter)? {
                    count += 1;
                }
            }
            RetryTarget::Level(level) => {
                for task in self.graph.tasks_at_level(level) {
                    if self.state.force_reset_task(&task.id, opts.reset_counter)? {
                        count += 1;
                    }
                }
            }
            RetryTarget::All => {
                for task_id in self.graph.tasks.keys() {
                    if self.state.force_reset_task(task_id, opts.reset_counter)? {
                        count += 1;
                    }
                }
            }
        }
        Ok(count)
    }

    /// spec.md §6 `merge(level, {force, skip_gates, abort})`: re-invoke the
    /// merge protocol for a level outside the main loop, e.g. after an
    /// operator manually resolved a conflict on the staging branch.
    pub async fn merge(&self, level: u32, opts: MergeOptions) -> Result<MergeOutcome, OrchestratorError> {
        let vcs = VcsBackend::new(&self.repo_path);
        let coordinator = MergeCoordinator::new(vcs, self.gates.clone());
        let worker_branches: Vec<WorkerBranch> = self
            .state
            .list_workers()
            .keys()
            .map(|&worker_id| WorkerBranch {
                worker_id,
                branch_name: worker_branch_name(&self.feature_id, worker_id),
            })
            .collect();
        let req = MergeRequest {
            feature_id: self.feature_id.clone(),
            level,
            base_branch: self.config.base_branch.clone(),
            worker_branches,
            force: opts.force,
            skip_gates: opts.skip_gates,
        };
        Ok(coordinator.merge_level(&self.state, &self.graph, req).await?)
    }

    /// spec.md §6 `cleanup(feature, {keep_logs, keep_branches, dry_run})`.
    /// `keep_logs` has no effect here: heartbeat/escalation artifacts are
    /// left untouched regardless, since they are the operator's audit trail
    /// rather than scheduler-owned scratch state.
    pub fn cleanup(&self, opts: CleanupOptions) -> Result<Vec<PathBuf>, OrchestratorError> {
        let mut removed = Vec::new();
        for worker in self.state.list_workers().values() {
            if worker.worktree.exists() {
                removed.push(worker.worktree.clone());
                if !opts.dry_run {
                    std::fs::remove_dir_all(&worker.worktree)?;
                }
            }
        }
        if !opts.keep_branches && !opts.dry_run {
            let repo_path = self.repo_path.clone();
            let feature_id = self.feature_id.clone();
            let worker_count = self.state.list_workers().len() as u32;
            tokio::task::block_in_place(|| -> Result<(), git2::Error> {
                let repo = git2::Repository::open(&repo_path)?;
                for i in 0..worker_count {
                    let name = worker_branch_name(&feature_id, WorkerId(i));
                    if let Ok(mut branch) = repo.find_branch(&name, git2::BranchType::Local) {
                        let _ = branch.delete();
                    }
                }
                Ok(())
            })?;
        }
        Ok(removed)
    }
}
