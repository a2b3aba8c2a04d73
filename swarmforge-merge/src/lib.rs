//! Merge Coordinator (spec.md §4.5): per-level branch collection, staging
//! merge, quality-gate evaluation, main promotion, and worker-branch rebase.
//!
//! Invoked by the Orchestrator once every task at a level has a terminal
//! status. Everything here is level-scoped and stateless between calls —
//! the caller (`swarmforge-orchestrator`) is the one tracking `current_level`
//! and `levels[L].status` in the State Manager.

mod coordinator;
mod error;
pub mod gate;
pub mod vcs;

pub use coordinator::{LevelFailure, MergeCoordinator, MergeOutcome, MergeRequest, WorkerBranch};
pub use error::MergeError;
pub use gate::{GateConfig, GateContext, GateOutcome, QualityGate, ShellGate};
pub use vcs::VcsBackend;
