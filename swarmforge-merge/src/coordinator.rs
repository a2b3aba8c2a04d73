//! Ties `vcs` (git operations) and `gate` (quality gates) into the full
//! per-level protocol of spec.md §4.5: completion check, staging merge,
//! gates, wiring advisory, promotion, rebase.

use crate::error::MergeError;
use crate::gate::{GateContext, GateOutcome, QualityGate};
use crate::vcs::{MergeAttempt, RebaseAttempt, VcsBackend};
use git2::Oid;
use std::sync::Arc;
use swarmforge_state::StateManager;
use swarmforge_types::{TaskGraph, TaskStatus, WorkerId};

#[derive(Debug, Clone)]
pub struct WorkerBranch {
    pub worker_id: WorkerId,
    pub branch_name: String,
}

/// One invocation of the merge protocol for a single level.
#[derive(Debug, Clone)]
pub struct MergeRequest {
    pub feature_id: String,
    pub level: u32,
    pub base_branch: String,
    pub worker_branches: Vec<WorkerBranch>,
    /// Proceed past an incomplete level or a failed required gate anyway
    /// (spec.md §4.5 "Policy on BLOCKED tasks" / step 1 / step 4).
    pub force: bool,
    pub skip_gates: bool,
}

/// Why `LEVEL_FAILED` was signaled (spec.md §4.5 "Failure semantics").
#[derive(Debug, Clone)]
pub enum LevelFailure {
    Incomplete {
        level: u32,
        incomplete: usize,
    },
    MergeConflict {
        worker_id: WorkerId,
        paths: Vec<String>,
    },
    GateFailed {
        name: String,
        outcome: GateOutcome,
    },
}

#[derive(Debug, Clone)]
pub enum MergeOutcome {
    Promoted {
        merge_commit: Oid,
        tag: String,
        wiring_warnings: Vec<String>,
        needs_rebase: Vec<WorkerId>,
    },
    LevelFailed(LevelFailure),
}

/// Stateless beyond its VCS handle and registered gates — level bookkeeping
/// (`current_level`, `levels[L].status`) lives in the State Manager, owned
/// by the Orchestrator.
pub struct MergeCoordinator {
    vcs: VcsBackend,
    gates: Vec<Arc<dyn QualityGate>>,
}

impl MergeCoordinator {
    pub fn new(vcs: VcsBackend, gates: Vec<Arc<dyn QualityGate>>) -> Self {
        Self { vcs, gates }
    }

    /// Run the full protocol (spec.md §4.5 steps 1-8) for one level.
    pub async fn merge_level(
        &self,
        state: &StateManager,
        graph: &TaskGraph,
        req: MergeRequest,
    ) -> Result<MergeOutcome, MergeError> {
        // Step 1: level-completion check.
        let incomplete = graph
            .tasks_at_level(req.level)
            .filter(|t| {
                state
                    .get_task(&t.id)
                    .map(|r| r.status != TaskStatus::Completed)
                    .unwrap_or(true)
            })
            .count();
        if incomplete > 0 && !req.force {
            return Ok(MergeOutcome::LevelFailed(LevelFailure::Incomplete {
                level: req.level,
                incomplete,
            }));
        }

        // Step 2: staging branch.
        let staging_branch = format!("{}/staging-L-{}", req.feature_id, req.level);
        self.vcs
            .create_staging_branch(staging_branch.clone(), req.base_branch.clone())
            .await?;

        // Step 3: merge order is fixed by worker id, not caller-supplied order.
        let mut branches = req.worker_branches.clone();
        branches.sort_by_key(|b| b.worker_id);

        for branch in &branches {
            let message = format!(
                "merge {} into {} (level {})",
                branch.branch_name, staging_branch, req.level
            );
            let attempt = self
                .vcs
                .merge_worker_branch(
                    staging_branch.clone(),
                    branch.worker_id,
                    branch.branch_name.clone(),
                    message,
                )
                .await?;

            if let MergeAttempt::Conflict(paths) = attempt {
                if !req.force {
                    return Ok(MergeOutcome::LevelFailed(LevelFailure::MergeConflict {
                        worker_id: branch.worker_id,
                        paths,
                    }));
                }
            }
        }

        // Step 4: quality gates, in registration order.
        if !req.skip_gates {
            let ctx = GateContext {
                staging_worktree: self.vcs.repo_path().to_path_buf(),
                level: req.level,
            };
            for gate in &self.gates {
                let outcome = gate.run(&ctx).await;
                let config = gate.config();
                if config.required && outcome.blocks_merge() && !req.force {
                    return Ok(MergeOutcome::LevelFailed(LevelFailure::GateFailed {
                        name: config.name.clone(),
                        outcome,
                    }));
                }
            }
        }

        // Step 5: wiring advisory (warning only, never blocks).
        let new_files: Vec<String> = graph
            .tasks_at_level(req.level)
            .flat_map(|t| t.files.create.iter().cloned())
            .collect();
        let wiring_warnings = self
            .vcs
            .wiring_advisory(staging_branch.clone(), new_files)
            .await
            .unwrap_or_default();

        // Step 6: promote base to staging head, tag the merge point.
        let target = self.vcs.branch_head(staging_branch.clone()).await?;
        let tag_name = format!("{}/level-{}-complete", req.feature_id, req.level);
        self.vcs
            .promote(req.base_branch.clone(), target, tag_name.clone())
            .await?;

        // Step 7: rebase every worker branch onto the promoted base.
        let mut needs_rebase = Vec::new();
        for branch in &branches {
            let attempt = self
                .vcs
                .rebase_worker_branch(branch.branch_name.clone(), req.base_branch.clone())
                .await?;
            if matches!(attempt, RebaseAttempt::Conflict) {
                needs_rebase.push(branch.worker_id);
            }
        }

        Ok(MergeOutcome::Promoted {
            merge_commit: target,
            tag: tag_name,
            wiring_warnings,
            needs_rebase,
        })
    }
}
