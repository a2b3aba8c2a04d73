//! Validation-error vocabulary for the task graph.
//!
//! Validation never fails fast: every violation across every rule is
//! collected so an operator sees the full list in one pass instead of
//! fixing the graph one error at a time.

use swarmforge_types::TaskId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum GraphValidationError {
    #[error("task id '{task_id}' does not match the identifier grammar")]
    InvalidIdentifier { task_id: String },

    #[error("task id '{task_id}' is declared more than once")]
    DuplicateTaskId { task_id: TaskId },

    #[error("task '{task_id}' has level {level}, levels must start at 1")]
    LevelBelowOne { task_id: TaskId, level: u32 },

    #[error("level indices are not contiguous starting at 1: found {found:?}")]
    NonContiguousLevels { found: Vec<u32> },

    #[error("task '{task_id}' depends on unknown task '{dependency}'")]
    UnknownDependency { task_id: TaskId, dependency: TaskId },

    #[error(
        "task '{task_id}' at level {task_level} depends on '{dependency}' at level \
         {dependency_level}, which is not strictly lower"
    )]
    DependencyLevelViolation {
        task_id: TaskId,
        dependency: TaskId,
        task_level: u32,
        dependency_level: u32,
    },

    #[error("dependency cycle detected: {}", cycle.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(" -> "))]
    DependencyCycle { cycle: Vec<TaskId> },

    #[error("level {level}: path '{path}' is declared in `create` by more than one task")]
    DuplicateCreate { level: u32, path: String },

    #[error("level {level}: path '{path}' is declared in `modify` by more than one task")]
    DuplicateModify { level: u32, path: String },

    #[error("level {level}: path '{path}' appears in both `create` and `modify` across tasks")]
    CreateModifyOverlap { level: u32, path: String },

    #[error("task '{task_id}' has an empty verification command")]
    EmptyVerificationCommand { task_id: TaskId },

    #[error("task '{task_id}' has an out-of-range verification timeout: {timeout_seconds}s")]
    InvalidTimeout { task_id: TaskId, timeout_seconds: u32 },
}

#[derive(Debug, thiserror::Error)]
#[error("task graph failed validation with {} violation(s)", .0.len())]
pub struct GraphInvalid(pub Vec<GraphValidationError>);
