//! Quality gates (spec.md §4.5 step 4): run in registration order against
//! the staging tree. `required` gates that don't return `Pass`/`Skip` fail
//! the merge unless the caller passes `force`.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::{timeout, Duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Pass,
    Fail,
    Skip,
    Timeout,
    Error,
}

impl GateOutcome {
    pub fn blocks_merge(self) -> bool {
        matches!(self, GateOutcome::Fail | GateOutcome::Timeout | GateOutcome::Error)
    }
}

pub struct GateContext {
    pub staging_worktree: PathBuf,
    pub level: u32,
}

#[derive(Debug, Clone)]
pub struct GateConfig {
    pub name: String,
    pub required: bool,
    pub timeout_seconds: u32,
}

#[async_trait]
pub trait QualityGate: Send + Sync {
    fn config(&self) -> &GateConfig;
    async fn run(&self, ctx: &GateContext) -> GateOutcome;
}

/// A gate backed by a shell command run against the staging worktree; exit
/// code 0 is `Pass`, anything else is `Fail`.
pub struct ShellGate {
    config: GateConfig,
    command: String,
}

impl ShellGate {
    pub fn new(config: GateConfig, command: impl Into<String>) -> Self {
        Self {
            config,
            command: command.into(),
        }
    }
}

#[async_trait]
impl QualityGate for ShellGate {
    fn config(&self) -> &GateConfig {
        &self.config
    }

    async fn run(&self, ctx: &GateContext) -> GateOutcome {
        run_shell(&self.command, &ctx.staging_worktree, self.config.timeout_seconds).await
    }
}

async fn run_shell(command: &str, cwd: &Path, timeout_seconds: u32) -> GateOutcome {
    let mut parts = command.split_whitespace();
    let Some(program) = parts.next() else {
        return GateOutcome::Error;
    };
    let args: Vec<&str> = parts.collect();

    let child = match Command::new(program)
        .args(&args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(err) => {
            tracing::warn!(%err, command, "quality gate failed to spawn");
            return GateOutcome::Error;
        }
    };

    match timeout(Duration::from_secs(timeout_seconds as u64), child.wait_with_output()).await {
        Ok(Ok(output)) if output.status.success() => GateOutcome::Pass,
        Ok(Ok(_)) => GateOutcome::Fail,
        Ok(Err(err)) => {
            tracing::warn!(%err, command, "quality gate process error");
            GateOutcome::Error
        }
        Err(_) => GateOutcome::Timeout,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> GateContext {
        GateContext {
            staging_worktree: std::env::temp_dir(),
            level: 1,
        }
    }

    #[tokio::test]
    async fn passing_command_yields_pass() {
        let gate = ShellGate::new(
            GateConfig {
                name: "true-gate".into(),
                required: true,
                timeout_seconds: 5,
            },
            "true",
        );
        assert_eq!(gate.run(&ctx()).await, GateOutcome::Pass);
    }

    #[tokio::test]
    async fn failing_command_yields_fail() {
        let gate = ShellGate::new(
            GateConfig {
                name: "false-gate".into(),
                required: true,
                timeout_seconds: 5,
            },
            "false",
        );
        assert_eq!(gate.run(&ctx()).await, GateOutcome::Fail);
    }

    #[tokio::test]
    async fn slow_command_times_out() {
        let gate = ShellGate::new(
            GateConfig {
                name: "slow-gate".into(),
                required: false,
                timeout_seconds: 1,
            },
            "sleep 5",
        );
        assert_eq!(gate.run(&ctx()).await, GateOutcome::Timeout);
    }
}
