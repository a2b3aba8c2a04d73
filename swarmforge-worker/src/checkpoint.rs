//! Context-usage checkpointing (spec.md §4.3 step 9).
//!
//! When a worker's `context_usage` crosses the threshold mid-task, it stages
//! whatever it has into a WIP commit that embeds a resume hint rather than
//! losing the partial work, and hands the task back as `PAUSED`.

use chrono::Utc;
use swarmforge_types::{TaskId, WorkerId};

/// Context usage at or above this fraction forces a checkpoint before the
/// next step of the execution loop runs.
pub const CHECKPOINT_THRESHOLD: f32 = 0.70;

pub fn should_checkpoint(context_usage: f32) -> bool {
    context_usage >= CHECKPOINT_THRESHOLD
}

/// Commit message for a WIP checkpoint commit, carrying everything a fresh
/// worker needs to resume (spec.md §4.3 step 9: "resume hint").
pub fn checkpoint_commit_message(worker_id: WorkerId, task_id: &TaskId, context_usage: f32) -> String {
    format!(
        "WIP checkpoint: {task_id}\n\n\
         worker: {worker_id}\n\
         task_id: {task_id}\n\
         context_usage: {context_usage:.2}\n\
         timestamp: {timestamp}\n\
         resume_hint: re-claim this task and continue from the worktree's working copy\n",
        timestamp = Utc::now().to_rfc3339(),
    )
}
