//! Escalation artifact (spec.md §3 "Escalation", §6 "Escalation artifact").

use crate::ids::{TaskId, WorkerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EscalationCategory {
    AmbiguousSpec,
    DependencyMissing,
    VerificationUnclear,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Escalation {
    pub worker_id: WorkerId,
    pub task_id: TaskId,
    pub timestamp: DateTime<Utc>,
    pub category: EscalationCategory,
    pub message: String,
    #[serde(default)]
    pub context: serde_json::Value,
    pub resolved: bool,
}

impl Escalation {
    pub fn new(
        worker_id: WorkerId,
        task_id: TaskId,
        category: EscalationCategory,
        message: impl Into<String>,
    ) -> Self {
        Self {
            worker_id,
            task_id,
            timestamp: Utc::now(),
            category,
            message: message.into(),
            context: serde_json::Value::Null,
            resolved: false,
        }
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_escalation_is_unresolved_with_null_context() {
        let esc = Escalation::new(
            WorkerId(0),
            TaskId::from("T1"),
            EscalationCategory::AmbiguousSpec,
            "create target already exists",
        );
        assert!(!esc.resolved);
        assert_eq!(esc.context, serde_json::Value::Null);
        assert_eq!(esc.category, EscalationCategory::AmbiguousSpec);
    }

    #[test]
    fn with_context_attaches_payload() {
        let esc = Escalation::new(
            WorkerId(1),
            TaskId::from("T2"),
            EscalationCategory::DependencyMissing,
            "modify target missing",
        )
        .with_context(serde_json::json!({"path": "src/lib.rs"}));
        assert_eq!(esc.context["path"], "src/lib.rs");
    }

    #[test]
    fn category_wire_format_is_screaming_snake_case() {
        let json = serde_json::to_string(&EscalationCategory::VerificationUnclear).unwrap();
        assert_eq!(json, "\"VERIFICATION_UNCLEAR\"");
    }
}
