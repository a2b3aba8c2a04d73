//! Escalation-intent artifact (spec.md §1: "only its process lifecycle,
//! I/O artifacts, and exit code are the core's concern").
//!
//! The external agent process is the only party that can judge whether a
//! failure is ambiguous — the worker runtime never guesses. If the agent
//! believes a failure warrants operator attention, it drops a small JSON
//! artifact in the worktree; the runtime reads it after exhausting retries
//! and turns it into an [`swarmforge_types::Escalation`].

use serde::Deserialize;
use std::path::Path;
use swarmforge_types::EscalationCategory;

pub const ESCALATION_INTENT_FILENAME: &str = ".swarmforge-escalation.json";

#[derive(Debug, Deserialize)]
pub struct EscalationIntent {
    pub category: EscalationCategory,
    pub message: String,
    #[serde(default)]
    pub context: serde_json::Value,
}

/// Read and remove the escalation-intent artifact from `worktree`, if any.
/// Removed on read so a stale intent from a previous attempt never leaks
/// into a later, unrelated failure.
pub fn take_escalation_intent(worktree: &Path) -> Option<EscalationIntent> {
    let path = worktree.join(ESCALATION_INTENT_FILENAME);
    let bytes = std::fs::read(&path).ok()?;
    let intent = serde_json::from_slice(&bytes).ok()?;
    let _ = std::fs::remove_file(&path);
    Some(intent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_and_removes_intent_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(ESCALATION_INTENT_FILENAME);
        std::fs::write(
            &path,
            r#"{"category":"VERIFICATION_UNCLEAR","message":"not sure what 'fast' means here"}"#,
        )
        .unwrap();

        let intent = take_escalation_intent(dir.path()).expect("intent should parse");
        assert_eq!(intent.category, EscalationCategory::VerificationUnclear);
        assert!(!path.exists());
    }

    #[test]
    fn absent_file_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(take_escalation_intent(dir.path()).is_none());
    }
}
