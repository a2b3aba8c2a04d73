//! Per-worker isolated worktrees and branches (spec.md §4.6 startup step 4,
//! §5 "Repository... Exclusive access per worker through isolated
//! worktrees on distinct branches").

use git2::{Repository, WorktreeAddOptions};
use std::path::{Path, PathBuf};
use swarmforge_types::WorkerId;

pub fn worker_branch_name(feature_id: &str, worker_id: WorkerId) -> String {
    format!("{feature_id}/worker-{}", worker_id.0)
}

/// Where a worker's worktree lives on disk, under `root`.
pub fn worker_worktree_path(root: &Path, feature_id: &str, worker_id: WorkerId) -> PathBuf {
    root.join(feature_id).join(format!("worker-{}", worker_id.0))
}

/// Create (or reuse) `worker_id`'s branch rooted at `base_branch` and an
/// isolated git worktree checked out onto it. Idempotent: if the worktree
/// directory already exists and is a valid linked worktree, it is reused
/// as-is (this is what makes orchestrator resume cheap).
pub fn ensure_worker_worktree(
    repo: &Repository,
    feature_id: &str,
    worker_id: WorkerId,
    base_branch: &str,
    worktree_root: &Path,
) -> Result<(PathBuf, String), git2::Error> {
    let branch_name = worker_branch_name(feature_id, worker_id);
    let path = worker_worktree_path(worktree_root, feature_id, worker_id);

    if path.exists() {
        return Ok((path, branch_name));
    }
    std::fs::create_dir_all(path.parent().unwrap_or(&path)).map_err(git2_io_error)?;

    let branch_ref = match repo.find_branch(&branch_name, git2::BranchType::Local) {
        Ok(branch) => branch.into_reference(),
        Err(_) => {
            let base = repo.find_branch(base_branch, git2::BranchType::Local)?;
            let base_commit = base.get().peel_to_commit()?;
            repo.branch(&branch_name, &base_commit, false)?.into_reference()
        }
    };

    let worktree_name = format!("{feature_id}-worker-{}", worker_id.0);
    let mut opts = WorktreeAddOptions::new();
    opts.reference(Some(&branch_ref));
    repo.worktree(&worktree_name, &path, Some(&opts))?;

    Ok((path, branch_name))
}

/// Rebuild a worker's worktree from scratch (spec.md §4.5 step 7 /
/// §4.6 startup: "or re-create them when `needs_rebase`") by pruning the
/// existing linked worktree and recreating it against the (now-rebased)
/// branch tip.
pub fn recreate_worker_worktree(
    repo: &Repository,
    feature_id: &str,
    worker_id: WorkerId,
    base_branch: &str,
    worktree_root: &Path,
) -> Result<(PathBuf, String), git2::Error> {
    let worktree_name = format!("{feature_id}-worker-{}", worker_id.0);
    let path = worker_worktree_path(worktree_root, feature_id, worker_id);

    if let Ok(worktree) = repo.find_worktree(&worktree_name) {
        let _ = worktree.prune(Some(git2::WorktreePruneOptions::new().valid(true).working_tree(true)));
    }
    let _ = std::fs::remove_dir_all(&path);

    ensure_worker_worktree(repo, feature_id, worker_id, base_branch, worktree_root)
}

fn git2_io_error(err: std::io::Error) -> git2::Error {
    git2::Error::from_str(&err.to_string())
}
