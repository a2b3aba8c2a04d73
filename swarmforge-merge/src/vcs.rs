//! Git operations the Merge Coordinator needs (spec.md §4.5 steps 2/3/6/7).
//!
//! `git2::Repository` is not `Send`, so every operation opens its own handle
//! inside `spawn_blocking` rather than holding one across an `.await` —
//! the same shape the worker crate uses for its own git2 calls, just pushed
//! onto a blocking thread because merges touch much larger trees.

use crate::error::MergeError;
use git2::{MergeOptions, Oid, Repository, Signature};
use std::path::{Path, PathBuf};
use swarmforge_types::WorkerId;

#[derive(Debug, Clone)]
pub enum MergeAttempt {
    Merged(Oid),
    Conflict(Vec<String>),
}

#[derive(Debug, Clone)]
pub enum RebaseAttempt {
    Succeeded(Oid),
    Conflict,
}

/// Wraps the repository all merge/staging operations run against.
#[derive(Clone)]
pub struct VcsBackend {
    repo_path: PathBuf,
}

impl VcsBackend {
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
        }
    }

    /// The repository's working directory. Quality gates (§4.5 step 4) run
    /// against whatever is currently checked out there — the last merge
    /// step leaves `staging-L-{level}` checked out.
    pub fn repo_path(&self) -> &std::path::Path {
        &self.repo_path
    }

    async fn blocking<F, T>(&self, f: F) -> Result<T, MergeError>
    where
        F: FnOnce(&Repository) -> Result<T, MergeError> + Send + 'static,
        T: Send + 'static,
    {
        let path = self.repo_path.clone();
        tokio::task::spawn_blocking(move || {
            let repo = Repository::open(&path)?;
            f(&repo)
        })
        .await?
    }

    /// spec.md §4.5 step 2: create `staging-L-{level}` from `base_branch`.
    pub async fn create_staging_branch(
        &self,
        staging_name: String,
        base_branch: String,
    ) -> Result<Oid, MergeError> {
        self.blocking(move |repo| {
            let base_ref = repo.find_branch(&base_branch, git2::BranchType::Local)?;
            let base_commit = base_ref.get().peel_to_commit()?;
            repo.branch(&staging_name, &base_commit, true)?;
            Ok(base_commit.id())
        })
        .await
    }

    /// spec.md §4.5 step 3: no-fast-forward merge of `worker_branch` into
    /// `staging_branch`. Conflicts are reported, never auto-resolved.
    pub async fn merge_worker_branch(
        &self,
        staging_branch: String,
        worker_id: WorkerId,
        worker_branch: String,
        message: String,
    ) -> Result<MergeAttempt, MergeError> {
        self.blocking(move |repo| {
            checkout_branch(repo, &staging_branch)?;

            let their_ref = repo.find_branch(&worker_branch, git2::BranchType::Local)?;
            let their_commit = their_ref.get().peel_to_commit()?;
            let their_annotated = repo.find_annotated_commit(their_commit.id())?;

            let mut merge_opts = MergeOptions::new();
            repo.merge(&[&their_annotated], Some(&mut merge_opts), None)?;

            let mut index = repo.index()?;
            if index.has_conflicts() {
                let conflicts: Vec<String> = index
                    .conflicts()?
                    .filter_map(|c| c.ok())
                    .filter_map(|c| {
                        c.our
                            .or(c.their)
                            .and_then(|e| String::from_utf8(e.path).ok())
                    })
                    .collect();
                repo.cleanup_state()?;
                repo.checkout_head(Some(git2::build::CheckoutBuilder::new().force()))?;
                return Ok(MergeAttempt::Conflict(conflicts));
            }

            let tree_oid = index.write_tree()?;
            let tree = repo.find_tree(tree_oid)?;
            let head_commit = repo.head()?.peel_to_commit()?;
            let signature = merge_signature(repo)?;
            let oid = repo.commit(
                Some("HEAD"),
                &signature,
                &signature,
                &message,
                &tree,
                &[&head_commit, &their_commit],
            )?;
            repo.cleanup_state()?;
            let _ = worker_id;
            Ok(MergeAttempt::Merged(oid))
        })
        .await
    }

    /// spec.md §4.5 step 6: advance `base_branch` to `target`, then tag it.
    pub async fn promote(
        &self,
        base_branch: String,
        target: Oid,
        tag_name: String,
    ) -> Result<(), MergeError> {
        self.blocking(move |repo| {
            let commit = repo.find_commit(target)?;
            let mut branch_ref = repo.find_branch(&base_branch, git2::BranchType::Local)?;
            branch_ref
                .get_mut()
                .set_target(target, "promote: advance base branch to merged staging head")?;
            let signature = merge_signature(repo)?;
            repo.tag_lightweight(&tag_name, commit.as_object(), false)?;
            let _ = signature;
            Ok(())
        })
        .await
    }

    /// spec.md §4.5 step 7: rebase `worker_branch` onto the newly promoted
    /// `base_branch`. A conflict leaves the worker's branch untouched and
    /// the repository's rebase state cleaned up; the caller marks the
    /// worker `needs_rebase`.
    pub async fn rebase_worker_branch(
        &self,
        worker_branch: String,
        base_branch: String,
    ) -> Result<RebaseAttempt, MergeError> {
        self.blocking(move |repo| {
            let branch_commit = repo
                .find_branch(&worker_branch, git2::BranchType::Local)?
                .get()
                .peel_to_commit()?;
            let upstream_commit = repo
                .find_branch(&base_branch, git2::BranchType::Local)?
                .get()
                .peel_to_commit()?;

            let branch_annotated = repo.find_annotated_commit(branch_commit.id())?;
            let upstream_annotated = repo.find_annotated_commit(upstream_commit.id())?;

            let mut rebase = repo.rebase(
                Some(&branch_annotated),
                Some(&upstream_annotated),
                None,
                None,
            )?;

            let signature = merge_signature(repo)?;
            while let Some(op) = rebase.next() {
                let op = op?;
                let _ = op;
                if repo.index()?.has_conflicts() {
                    rebase.abort()?;
                    return Ok(RebaseAttempt::Conflict);
                }
                rebase.commit(None, &signature, None)?;
            }
            rebase.finish(Some(&signature))?;

            let new_head = repo
                .find_branch(&worker_branch, git2::BranchType::Local)?
                .get()
                .peel_to_commit()?;
            Ok(RebaseAttempt::Succeeded(new_head.id()))
        })
        .await
    }

    pub async fn branch_head(&self, branch: String) -> Result<Oid, MergeError> {
        self.blocking(move |repo| {
            Ok(repo
                .find_branch(&branch, git2::BranchType::Local)?
                .get()
                .peel_to_commit()?
                .id())
        })
        .await
    }

    /// spec.md §4.5 step 5 (wiring advisory): for each newly added file,
    /// search the rest of the tree for a non-test blob that mentions its
    /// file stem. Files with no hit are reported — this is a warning, not a
    /// merge blocker.
    pub async fn wiring_advisory(
        &self,
        branch: String,
        new_files: Vec<String>,
    ) -> Result<Vec<String>, MergeError> {
        self.blocking(move |repo| {
            let commit = repo.find_branch(&branch, git2::BranchType::Local)?.get().peel_to_commit()?;
            let tree = commit.tree()?;

            let mut blobs: Vec<(String, Vec<u8>)> = Vec::new();
            tree.walk(git2::TreeWalkMode::PreOrder, |root, entry| {
                if entry.kind() == Some(git2::ObjectType::Blob) {
                    if let Some(name) = entry.name() {
                        let path = format!("{root}{name}");
                        if let Ok(obj) = entry.to_object(repo) {
                            if let Some(blob) = obj.as_blob() {
                                blobs.push((path, blob.content().to_vec()));
                            }
                        }
                    }
                }
                git2::TreeWalkResult::Ok
            })?;

            let mut warnings = Vec::new();
            for new_file in &new_files {
                let stem = Path::new(new_file)
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or(new_file.as_str());

                let referenced = blobs.iter().any(|(path, content)| {
                    if path == new_file || path.contains("test") {
                        return false;
                    }
                    String::from_utf8_lossy(content).contains(stem)
                });

                if !referenced {
                    warnings.push(format!(
                        "{new_file}: no non-test caller found referencing `{stem}`"
                    ));
                }
            }
            Ok(warnings)
        })
        .await
    }
}

fn checkout_branch(repo: &Repository, branch: &str) -> Result<(), MergeError> {
    let obj = repo.revparse_single(&format!("refs/heads/{branch}"))?;
    repo.checkout_tree(&obj, None)?;
    repo.set_head(&format!("refs/heads/{branch}"))?;
    Ok(())
}

fn merge_signature(repo: &Repository) -> Result<Signature<'static>, MergeError> {
    let config = repo.config()?;
    let name = config
        .get_string("user.name")
        .unwrap_or_else(|_| "swarmforge-merge".to_string());
    let email = config
        .get_string("user.email")
        .unwrap_or_else(|_| "merge@swarmforge.local".to_string());
    Ok(Signature::now(&name, &email)?)
}
