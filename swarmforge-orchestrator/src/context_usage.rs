//! Context-usage sampling (spec.md §4.3 step 9): only the external agent
//! knows how much of its own context window it has consumed, so it reports
//! that back through a small artifact file in its worktree — the same
//! "artifact, not an API call" shape `swarmforge_worker::escalation` uses
//! for escalation intents.

use std::path::Path;

pub const CONTEXT_USAGE_FILENAME: &str = ".swarmforge-context-usage";

/// Reads the worker's self-reported context usage (0.0-1.0), defaulting to
/// 0.0 if the agent process never wrote one (e.g. the no-op diagnostic
/// process, or an agent that doesn't support checkpointing).
pub fn read_context_usage(worktree: &Path) -> f32 {
    std::fs::read_to_string(worktree.join(CONTEXT_USAGE_FILENAME))
        .ok()
        .and_then(|s| s.trim().parse::<f32>().ok())
        .unwrap_or(0.0)
        .clamp(0.0, 1.0)
}
