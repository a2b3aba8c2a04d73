//! Protocol-violation detection (spec.md §4.3 step 3, §7 `TASK_PROTOCOL_VIOLATION`).
//!
//! After the implement step, diff the worktree against HEAD and confirm
//! every changed path is in the task's declared `create ∪ modify` set.
//! Anything else is a protocol violation and fails the task without retry.

use git2::{Repository, StatusOptions};
use std::collections::HashSet;
use swarmforge_types::Task;

/// Returns the changed paths that fall outside the task's ownership set.
/// Empty means the worker stayed within its declared files.
pub fn find_out_of_scope_changes(
    repo: &Repository,
    task: &Task,
) -> Result<Vec<String>, git2::Error> {
    let owned: HashSet<&str> = task.files.owned();

    let mut opts = StatusOptions::new();
    opts.include_untracked(true).recurse_untracked_dirs(true);
    let statuses = repo.statuses(Some(&mut opts))?;

    let mut violations = Vec::new();
    for entry in statuses.iter() {
        let Some(path) = entry.path() else { continue };
        if !owned.contains(path) {
            violations.push(path.to_string());
        }
    }
    violations.sort();
    Ok(violations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarmforge_types::{TaskFiles, TaskId, Verification};
    use std::fs;

    fn task_with_files(create: Vec<&str>, modify: Vec<&str>) -> Task {
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
    fn flags_writes_outside_ownership() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        fs::write(dir.path().join("a.rs"), "fn a() {}").unwrap();
        fs::write(dir.path().join("b.rs"), "fn b() {}").unwrap();

        let task = task_with_files(vec!["a.rs"], vec![]);
        let violations = find_out_of_scope_changes(&repo, &task).unwrap();
        assert_eq!(violations, vec!["b.rs".to_string()]);
    }

    #[test]
    fn no_violations_when_scope_respected() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        fs::write(dir.path().join("a.rs"), "fn a() {}").unwrap();

        let task = task_with_files(vec!["a.rs"], vec![]);
        let violations = find_out_of_scope_changes(&repo, &task).unwrap();
        assert!(violations.is_empty());
    }
}
