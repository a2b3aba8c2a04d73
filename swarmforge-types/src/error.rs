//! The shared error-category taxonomy from spec.md §7.
//!
//! Each crate defines its own `thiserror` error enum for its own fallible
//! operations; this enum is the common vocabulary those enums map onto so
//! that the orchestrator can report one categorized failure kind to the
//! operator regardless of which component raised it.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureCategory {
    InvalidGraph,
    TaskVerificationFailed,
    TaskProtocolViolation,
    DependencyMissing,
    AmbiguousSpec,
    VerificationUnclear,
    WorkerStalled,
    WorkerCrashed,
    MergeConflict,
    GateFailure,
    StateCorruption,
}

/// The operator-visible failure record required by spec.md §7
/// ("the operator always sees...").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorizedFailure {
    pub category: FailureCategory,
    pub subject: String,
    pub detail: String,
    pub last_output: Option<String>,
}

impl CategorizedFailure {
    pub fn new(category: FailureCategory, subject: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            category,
            subject: subject.into(),
            detail: detail.into(),
            last_output: None,
        }
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.last_output = Some(output.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_failure_has_no_output_until_attached() {
        let failure = CategorizedFailure::new(FailureCategory::MergeConflict, "level-2", "conflict in src/lib.rs");
        assert!(failure.last_output.is_none());
        let failure = failure.with_output("CONFLICT (content): Merge conflict in src/lib.rs");
        assert_eq!(
            failure.last_output.as_deref(),
            Some("CONFLICT (content): Merge conflict in src/lib.rs")
        );
    }

    #[test]
    fn category_wire_format_is_screaming_snake_case() {
        let json = serde_json::to_string(&FailureCategory::TaskProtocolViolation).unwrap();
        assert_eq!(json, "\"TASK_PROTOCOL_VIOLATION\"");
    }
}
