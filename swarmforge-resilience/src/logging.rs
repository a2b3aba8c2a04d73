//! Structured logging entry point shared by every `swarmforge-*` binary and
//! test harness.
//!
//! Every crate initializes through [`init_tracing`] rather than configuring
//! `tracing-subscriber` itself, so log shape (JSON vs. human, level filter)
//! stays consistent across the orchestrator, worker runtime, and health
//! monitor.

use std::env;
use tracing_subscriber::EnvFilter;

/// Output shape for the global subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, for local runs and tests.
    Pretty,
    /// One JSON object per line, for production log aggregation.
    Json,
}

/// Initialize the process-wide `tracing` subscriber.
///
/// Reads the level filter from `RUST_LOG` (default `info`) and the format
/// from `SWARMFORGE_LOG_FORMAT` (`json` or `pretty`, default `pretty`).
/// Safe to call more than once per process (e.g. from multiple `#[test]`
/// functions); later calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let format = match env::var("SWARMFORGE_LOG_FORMAT").as_deref() {
        Ok("json") => LogFormat::Json,
        _ => LogFormat::Pretty,
    };

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    let result = match format {
        LogFormat::Json => subscriber.json().try_init(),
        LogFormat::Pretty => subscriber.try_init(),
    };

    if let Err(err) = result {
        tracing::debug!(%err, "tracing subscriber already initialized");
    }
}

/// The fields every log line emitted by the orchestration loop should carry
/// when they're available, bundled so call sites can attach them with one
/// `tracing::info_span!` call instead of repeating field names.
#[derive(Debug, Clone, Default)]
pub struct LogContext {
    pub feature_id: Option<String>,
    pub task_id: Option<String>,
    pub worker_id: Option<u32>,
    pub level: Option<u32>,
}

impl LogContext {
    pub fn feature(feature_id: impl Into<String>) -> Self {
        Self {
            feature_id: Some(feature_id.into()),
            ..Default::default()
        }
    }

    pub fn with_task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    pub fn with_worker(mut self, worker_id: u32) -> Self {
        self.worker_id = Some(worker_id);
        self
    }

    pub fn with_level(mut self, level: u32) -> Self {
        self.level = Some(level);
        self
    }

    /// Open a `tracing` span carrying this context's fields. Empty fields
    /// are logged as `"-"` since `tracing` spans need a fixed field set.
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "swarmforge",
            feature_id = self.feature_id.as_deref().unwrap_or("-"),
            task_id = self.task_id.as_deref().unwrap_or("-"),
            worker_id = self.worker_id.unwrap_or(0),
            level = self.level.unwrap_or(0),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_builder_chains() {
        let ctx = LogContext::feature("checkout-v2")
            .with_task("task-01")
            .with_worker(3)
            .with_level(2);
        assert_eq!(ctx.feature_id.as_deref(), Some("checkout-v2"));
        assert_eq!(ctx.task_id.as_deref(), Some("task-01"));
        assert_eq!(ctx.worker_id, Some(3));
        assert_eq!(ctx.level, Some(2));
    }

    #[test]
    fn init_tracing_is_idempotent() {
        init_tracing();
        init_tracing();
    }
}
