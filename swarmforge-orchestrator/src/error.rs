//! Top-level error type the Orchestrator's control operations return.
//! Maps onto the shared [`swarmforge_types::FailureCategory`] vocabulary so
//! callers get one categorized failure regardless of which crate raised it
//! (spec.md §7 "the operator always sees... a categorized failure").

use swarmforge_types::{FailureCategory, TaskId};

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum OrchestratorError {
    #[error("task graph is invalid: {0}")]
    InvalidGraph(#[from] swarmforge_graph::GraphInvalid),

    #[error("state manager error: {0}")]
    State(#[from] swarmforge_state::StateError),

    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("merge error: {0}")]
    Merge(#[from] swarmforge_merge::MergeError),

    #[error("level {level} failed: {reason}")]
    LevelFailed { level: u32, reason: String },

    #[error("requested worker_count {requested} exceeds configured max_count {max_count}")]
    WorkerCountExceedsMax { requested: usize, max_count: usize },

    #[error("task {task_id} not found in the graph")]
    UnknownTask { task_id: TaskId },

    #[error("no feature state found at the given path; cannot resume")]
    NothingToResume,
}

impl OrchestratorError {
    pub fn category(&self) -> FailureCategory {
        match self {
            OrchestratorError::InvalidGraph(_) => FailureCategory::InvalidGraph,
            OrchestratorError::Merge(swarmforge_merge::MergeError::MergeConflict { .. }) => {
                FailureCategory::MergeConflict
            }
            OrchestratorError::Merge(swarmforge_merge::MergeError::GateFailed { .. }) => {
                FailureCategory::GateFailure
            }
            OrchestratorError::LevelFailed { .. } => FailureCategory::GateFailure,
            _ => FailureCategory::StateCorruption,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_failed_maps_to_gate_failure_category() {
        let err = OrchestratorError::LevelFailed {
            level: 2,
            reason: "merge conflict".into(),
        };
        assert_eq!(err.category(), FailureCategory::GateFailure);
    }

    #[test]
    fn unknown_task_falls_back_to_state_corruption_category() {
        let err = OrchestratorError::UnknownTask {
            task_id: TaskId::from("T1"),
        };
        assert_eq!(err.category(), FailureCategory::StateCorruption);
    }
}
