use swarmforge_types::{EscalationCategory, TaskId, WorkerId};

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum WorkerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    #[error("state manager error: {0}")]
    State(#[from] swarmforge_state::StateError),

    #[error("failed to (de)serialize artifact: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("task {task_id} claim failed, it is no longer eligible")]
    ClaimFailed { task_id: TaskId },

    #[error("verification tier {tier} failed: {output}")]
    VerificationFailed { tier: u8, output: String },

    #[error("worker {worker_id} touched files outside its ownership set for task {task_id}: {paths:?}")]
    ProtocolViolation {
        worker_id: WorkerId,
        task_id: TaskId,
        paths: Vec<String>,
    },

    #[error("task {task_id} escalated: {category:?} — {message}")]
    Escalated {
        task_id: TaskId,
        category: EscalationCategory,
        message: String,
    },

    #[error("implementation process timed out after {timeout_seconds}s")]
    Timeout { timeout_seconds: u32 },
}
