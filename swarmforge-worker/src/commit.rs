//! Commit step (spec.md §4.3 step 5): stage exactly the owned files and
//! advance the worker's branch by one commit per completed task.

use crate::error::WorkerError;
use crate::verification::VerificationReport;
use git2::{Repository, Signature};
use swarmforge_types::{Task, WorkerId};

/// Build the commit message required by spec.md §4.3 step 5: it must embed
/// `feature`, `task_id`, `worker_id`, a verification summary, and `level`.
pub fn commit_message(
    feature_id: &str,
    task: &Task,
    worker_id: WorkerId,
    report: &VerificationReport,
) -> String {
    format!(
        "{title} ({task_id})\n\n\
         feature: {feature_id}\n\
         task_id: {task_id}\n\
         worker: {worker_id}\n\
         level: {level}\n\
         verification: tier1={tier1} tier2={tier2} tier3={tier3}\n",
        title = task.title,
        task_id = task.id,
        level = task.level,
        tier1 = report.tier1_passed,
        tier2 = report.tier2_passed,
        tier3 = report.tier3_passed,
    )
}

/// Stage exactly `task.files.create ∪ task.files.modify` and commit on top
/// of the worker's current branch HEAD.
///
/// Staging only the owned set (rather than `git add -A`) means a worker that
/// left stray, already-flagged out-of-scope changes in the worktree can
/// never smuggle them into the commit even if the protocol-violation check
/// were ever bypassed upstream.
pub fn commit_owned_files(
    repo: &Repository,
    task: &Task,
    message: &str,
) -> Result<git2::Oid, WorkerError> {
    let mut index = repo.index()?;
    for path in task.files.create.iter().chain(task.files.modify.iter()) {
        index.add_path(std::path::Path::new(path))?;
    }
    index.write()?;
    let tree_oid = index.write_tree()?;
    let tree = repo.find_tree(tree_oid)?;

    let signature = worker_signature(repo)?;
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();

    let oid = repo.commit(
        Some("HEAD"),
        &signature,
        &signature,
        message,
        &tree,
        &parents,
    )?;
    Ok(oid)
}

fn worker_signature(repo: &Repository) -> Result<Signature<'static>, WorkerError> {
    let config = repo.config()?;
    let name = config
        .get_string("user.name")
        .unwrap_or_else(|_| "swarmforge-worker".to_string());
    let email = config
        .get_string("user.email")
        .unwrap_or_else(|_| "worker@swarmforge.local".to_string());
    Ok(Signature::now(&name, &email)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use swarmforge_types::{TaskFiles, TaskId, Verification};

    fn task() -> Task {
        Task {
            id: TaskId::from("T1"),
            title: "Add widget".into(),
            description: String::new(),
            level: 2,
            dependencies: Default::default(),
            files: TaskFiles {
                create: vec!["a.rs".into()],
                modify: vec![],
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

    fn report() -> VerificationReport {
        VerificationReport {
            tier1_passed: true,
            tier2_passed: true,
            tier3_passed: true,
            integration_test_skipped: true,
            last_output: String::new(),
        }
    }

    #[test]
    fn message_embeds_required_fields() {
        let msg = commit_message("checkout-v2", &task(), WorkerId(1), &report());
        assert!(msg.contains("feature: checkout-v2"));
        assert!(msg.contains("task_id: T1"));
        assert!(msg.contains("worker: worker-1"));
        assert!(msg.contains("level: 2"));
    }

    #[test]
    fn commits_only_owned_files() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        {
            let mut config = repo.config().unwrap();
            config.set_str("user.name", "test").unwrap();
            config.set_str("user.email", "test@example.com").unwrap();
        }
        fs::write(dir.path().join("a.rs"), "fn a() {}").unwrap();
        fs::write(dir.path().join("stray.rs"), "fn stray() {}").unwrap();

        let t = task();
        let msg = commit_message("checkout-v2", &t, WorkerId(0), &report());
        commit_owned_files(&repo, &t, &msg).unwrap();

        let head = repo.head().unwrap().peel_to_commit().unwrap();
        let tree = head.tree().unwrap();
        assert!(tree.get_path(std::path::Path::new("a.rs")).is_ok());
        assert!(tree.get_path(std::path::Path::new("stray.rs")).is_err());
    }
}
