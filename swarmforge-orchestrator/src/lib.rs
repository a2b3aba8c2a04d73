//! Orchestrator/Scheduler (spec.md §4.6): validates the task graph, drives
//! the level-synchronous worker pool, and invokes the Merge Coordinator at
//! every level barrier. This crate wires every other `swarmforge-*` crate
//! into the one control surface an external front end calls.

pub mod agent;
pub mod config;
pub mod context_usage;
pub mod error;
pub mod escalations;
pub mod health_bridge;
pub mod pool;
pub mod scheduler;
pub mod worktree;

pub use agent::{ConfiguredAgentProcess, NoopAgentProcess};
pub use config::OrchestratorConfig;
pub use error::OrchestratorError;
pub use escalations::EscalationLog;
pub use scheduler::{
    CleanupOptions, MergeOptions, Orchestrator, RetryOptions, RetryTarget, RunOptions,
    RunOutcome, StopOptions,
};
