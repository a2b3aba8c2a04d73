//! The per-task execution loop (spec.md §4.3): claim, load context,
//! implement, checkpoint-check, verify, check ownership, commit, report.
//!
//! One call to [`execute_task`] is one attempt at one task. Retrying a
//! `TASK_VERIFICATION_FAILED` failure means the Orchestrator (§4.6 step 3)
//! redispatches the now-`PENDING` task to a worker — possibly a different
//! one — not that this function loops internally.

use crate::checkpoint::{checkpoint_commit_message, should_checkpoint};
use crate::commit::{commit_message, commit_owned_files};
use crate::context::check_preconditions;
use crate::error::WorkerError;
use crate::escalation::take_escalation_intent;
use crate::heartbeat::HeartbeatPublisher;
use crate::ownership::find_out_of_scope_changes;
use crate::process::WorkerProcess;
use crate::verification::{verify, VerificationConfig};
use git2::Repository;
use std::path::Path;
use swarmforge_state::{FailureOutcome, StateManager};
use swarmforge_types::{Escalation, EscalationCategory, TaskGraph, TaskId, TaskStatus, WorkerId, WorkerStep};

/// Static, per-worker execution configuration. `syntax_command` and
/// `quality_command` are optional because not every feature configures
/// tier 1 / tier 3 checks (spec.md §4.3: tier 1 runs "if any").
#[derive(Debug, Clone, Default)]
pub struct ExecutionConfig {
    pub max_retries: u32,
    pub syntax_command: Option<String>,
    pub quality_command: Option<String>,
}

/// What happened to the claimed task after one execution attempt.
#[derive(Debug)]
pub enum TaskOutcome {
    Completed,
    RetryPending,
    Blocked { escalation: Option<Escalation> },
    Checkpoint { context_usage: f32 },
}

/// Run one attempt at `task_id` in `worktree`/`repo`, publishing heartbeats
/// through `heartbeats` and consulting `context_usage` for the checkpoint
/// decision (spec.md §4.3 step 9). `context_usage` is sampled rather than
/// pushed because only the external agent — out of this crate's scope —
/// knows its own resource consumption.
#[allow(clippy::too_many_arguments)]
pub async fn execute_task(
    state: &StateManager,
    graph: &TaskGraph,
    task_id: &TaskId,
    worker_id: WorkerId,
    feature_id: &str,
    repo: &Repository,
    worktree: &Path,
    process: &dyn WorkerProcess,
    heartbeats: &HeartbeatPublisher,
    config: &ExecutionConfig,
    context_usage: &dyn Fn() -> f32,
) -> Result<TaskOutcome, WorkerError> {
    // Step 1: claim.
    if !state.claim_task(graph, task_id, worker_id)? {
        return Err(WorkerError::ClaimFailed {
            task_id: task_id.clone(),
        });
    }

    let task = graph
        .get(task_id)
        .expect("claim_task succeeded so the task exists in the graph")
        .clone();

    heartbeats.publish(Some(task_id.clone()), WorkerStep::LoadingContext, 5.0)?;

    // Step 2: context load, including the two structural edge cases.
    let preconditions = check_preconditions(&task, worktree);
    if !preconditions.is_empty() {
        use crate::context::ContextLoadError;
        let (category, message) = match &preconditions[0] {
            ContextLoadError::MissingModifyTarget { path } => (
                EscalationCategory::DependencyMissing,
                format!("file declared in `modify` is missing at task start: {path}"),
            ),
            ContextLoadError::CreateTargetAlreadyExists { path } => (
                EscalationCategory::AmbiguousSpec,
                format!("file declared in `create` already exists: {path}"),
            ),
        };
        return block_with_escalation(state, task_id, worker_id, category, message).await;
    }

    if should_checkpoint(context_usage()) {
        return run_checkpoint(state, repo, task_id, worker_id, heartbeats, context_usage()).await;
    }

    // Step 3: implement.
    heartbeats.publish(Some(task_id.clone()), WorkerStep::Implementing, 25.0)?;
    if let Err(err) = process.implement(&task, worktree).await {
        return fail_or_block(state, task_id, worker_id, config, worktree, err.to_string()).await;
    }

    if should_checkpoint(context_usage()) {
        return run_checkpoint(state, repo, task_id, worker_id, heartbeats, context_usage()).await;
    }

    // Ownership check (spec.md §4.3 step 3 / §7 `TASK_PROTOCOL_VIOLATION`):
    // runs before verification so an out-of-scope write never gets graded.
    let violations = find_out_of_scope_changes(repo, &task)?;
    if !violations.is_empty() {
        return block_with_escalation(
            state,
            task_id,
            worker_id,
            EscalationCategory::AmbiguousSpec,
            format!(
                "worker touched files outside its ownership set for {task_id}: {violations:?}"
            ),
        )
        .await;
    }

    // Step 4: verify. A declared `integration_test` path that doesn't exist
    // at task start is the spec.md §4.3 edge case "integration-test path
    // absent": skip it rather than letting it run as a missing-file command
    // and fail tier 2 for the wrong reason.
    let integration_test_command = match &task.integration_test {
        Some(path) if worktree.join(path).exists() => Some(path.as_str()),
        Some(path) => {
            tracing::warn!(%task_id, path, "declared integration_test path absent at task start; skipping");
            None
        }
        None => None,
    };

    heartbeats.publish(Some(task_id.clone()), WorkerStep::VerifyingTier1, 50.0)?;
    let report = verify(
        VerificationConfig {
            syntax_command: config.syntax_command.as_deref(),
            correctness_command: &task.verification.command,
            integration_test_command,
            quality_command: config.quality_command.as_deref(),
            timeout_seconds: task.verification.timeout_seconds,
        },
        worktree,
    )
    .await?;
    heartbeats.publish(Some(task_id.clone()), WorkerStep::VerifyingTier3, 80.0)?;

    if !report.blocking_passed() {
        return fail_or_block(
            state,
            task_id,
            worker_id,
            config,
            worktree,
            report.last_output.clone(),
        )
        .await;
    }

    // Step 5: commit.
    heartbeats.publish(Some(task_id.clone()), WorkerStep::Committing, 90.0)?;
    let message = commit_message(feature_id, &task, worker_id, &report);
    commit_owned_files(repo, &task, &message)?;

    // Step 6: report.
    state.update_task_status(task_id, TaskStatus::Completed, None)?;
    heartbeats.publish(Some(task_id.clone()), WorkerStep::Idle, 100.0)?;

    Ok(TaskOutcome::Completed)
}

/// Steps 7/8: a failure that may or may not be ambiguous. Retryable
/// failures return `RetryPending`; once retries are exhausted, the
/// worktree's escalation-intent artifact (if any) decides whether this
/// becomes an escalated `BLOCKED` or a silent one (spec.md §4.3 step 8).
async fn fail_or_block(
    state: &StateManager,
    task_id: &TaskId,
    worker_id: WorkerId,
    config: &ExecutionConfig,
    worktree: &Path,
    error: String,
) -> Result<TaskOutcome, WorkerError> {
    let outcome = state
        .fail_task(task_id, Some(error), config.max_retries)?
        .ok_or_else(|| WorkerError::ClaimFailed {
            task_id: task_id.clone(),
        })?;

    match outcome {
        FailureOutcome::RetryPending => Ok(TaskOutcome::RetryPending),
        FailureOutcome::Blocked => {
            let escalation = take_escalation_intent(worktree).map(|intent| {
                Escalation::new(worker_id, task_id.clone(), intent.category, intent.message)
                    .with_context(intent.context)
            });
            Ok(TaskOutcome::Blocked { escalation })
        }
    }
}

/// A structural failure (§4.3 edge cases, §7 `TASK_PROTOCOL_VIOLATION`) is
/// never retried: it goes straight to `BLOCKED` with an escalation record.
async fn block_with_escalation(
    state: &StateManager,
    task_id: &TaskId,
    worker_id: WorkerId,
    category: EscalationCategory,
    message: String,
) -> Result<TaskOutcome, WorkerError> {
    state.block_task(task_id, Some(message.clone()))?;
    Ok(TaskOutcome::Blocked {
        escalation: Some(Escalation::new(worker_id, task_id.clone(), category, message)),
    })
}

/// Step 9: stage whatever progress exists into a WIP commit and pause the
/// task for a fresh worker to resume later.
async fn run_checkpoint(
    state: &StateManager,
    repo: &Repository,
    task_id: &TaskId,
    worker_id: WorkerId,
    heartbeats: &HeartbeatPublisher,
    context_usage: f32,
) -> Result<TaskOutcome, WorkerError> {
    heartbeats.publish(Some(task_id.clone()), WorkerStep::Committing, 0.0)?;

    let mut index = repo.index()?;
    index.add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)?;
    index.write()?;
    if repo.statuses(None)?.iter().count() > 0 || repo.head().is_err() {
        let message = checkpoint_commit_message(worker_id, task_id, context_usage);
        let tree_oid = index.write_tree()?;
        let tree = repo.find_tree(tree_oid)?;
        let signature = git2::Signature::now("swarmforge-worker", "worker@swarmforge.local")?;
        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        repo.commit(Some("HEAD"), &signature, &signature, &message, &tree, &parents)?;
    }

    state.update_task_status(task_id, TaskStatus::Paused, None)?;
    Ok(TaskOutcome::Checkpoint { context_usage })
}
