//! Context-load step (spec.md §4.3 step 2) and its two edge cases: a
//! `modify` file missing at task start, and a `create` file that already
//! exists.

use std::path::Path;
use swarmforge_types::Task;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextLoadError {
    /// spec.md §4.3 edge case: "A file listed in `modify` but missing at
    /// task start: task fails with `DEPENDENCY_MISSING`".
    MissingModifyTarget { path: String },
    /// spec.md §4.3 edge case: "A file listed in `create` that already
    /// exists: task fails with `AMBIGUOUS_SPEC`".
    CreateTargetAlreadyExists { path: String },
}

/// Validate the task's file-ownership preconditions before handing control
/// to the external agent. Returns the first violation found; callers that
/// want every violation can repeat with `check_all`.
pub fn check_preconditions(task: &Task, worktree: &Path) -> Vec<ContextLoadError> {
    let mut errors = Vec::new();

    for path in &task.files.modify {
        if !worktree.join(path).exists() {
            errors.push(ContextLoadError::MissingModifyTarget { path: path.clone() });
        }
    }
    for path in &task.files.create {
        if worktree.join(path).exists() {
            errors.push(ContextLoadError::CreateTargetAlreadyExists { path: path.clone() });
        }
    }
    errors
}

/// Read the advisory `files.read` set plus the feature's requirements and
/// design artifacts into a single context blob handed to the external
/// agent. Unreadable paths are skipped with a warning rather than failing
/// the task — `read` access is advisory (spec.md §3).
pub fn load_read_context(task: &Task, worktree: &Path) -> Vec<(String, String)> {
    let mut loaded = Vec::new();
    for path in &task.files.read {
        match std::fs::read_to_string(worktree.join(path)) {
            Ok(contents) => loaded.push((path.clone(), contents)),
            Err(err) => {
                tracing::warn!(path, %err, "could not load advisory read-context file");
            }
        }
    }
    loaded
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarmforge_types::{TaskFiles, TaskId, Verification};

    fn task(create: Vec<&str>, modify: Vec<&str>) -> Task {
        Task {
            id: TaskId::from("T1"),
            title: "t".into(),
            description: String::new(),
            level: 1,
            dependencies: Default::default(),
            files: TaskFiles {
                create: create.into_iter().map(String::from).collect(),
                modify: modify.into_iter().map(String::from).collect(),
                read: vec![],
            },
            verification: Verification {
                command: "true".into(),
                timeout_seconds: 10,
            },
            integration_test: None,
            estimate_minutes: None,
        }
    }

    #[test]
    fn flags_missing_modify_target() {
        let dir = tempfile::tempdir().unwrap();
        let errors = check_preconditions(&task(vec![], vec!["missing.rs"]), dir.path());
        assert_eq!(
            errors,
            vec![ContextLoadError::MissingModifyTarget { path: "missing.rs".into() }]
        );
    }

    #[test]
    fn flags_create_target_that_already_exists() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("already.rs"), "fn f() {}").unwrap();
        let errors = check_preconditions(&task(vec!["already.rs"], vec![]), dir.path());
        assert_eq!(
            errors,
            vec![ContextLoadError::CreateTargetAlreadyExists { path: "already.rs".into() }]
        );
    }

    #[test]
    fn no_violations_on_well_formed_worktree() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("existing.rs"), "fn f() {}").unwrap();
        let errors = check_preconditions(&task(vec!["new.rs"], vec!["existing.rs"]), dir.path());
        assert!(errors.is_empty());
    }
}
