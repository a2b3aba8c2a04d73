//! The "implement" step of the execution loop is driven by an external
//! LLM agent process; this module owns only its lifecycle (spawn, pipe,
//! timeout, exit code), never its reasoning.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{info, warn};

use crate::error::WorkerError;
use swarmforge_types::Task;

/// Abstracts "run the agent against this task in this worktree" so the
/// execution loop can be tested against a fake without spawning a real
/// process.
#[async_trait]
pub trait WorkerProcess: Send + Sync {
    async fn implement(&self, task: &Task, worktree: &Path) -> Result<(), WorkerError>;
}

/// Spawns the configured agent command as a child process in the worktree,
/// bounded by the task's verification timeout as an upper bound on the
/// whole implement step.
pub struct ExternalAgentProcess {
    pub command: String,
    pub args: Vec<String>,
    pub timeout_seconds: u32,
}

impl ExternalAgentProcess {
    pub fn new(command: impl Into<String>, args: Vec<String>, timeout_seconds: u32) -> Self {
        Self {
            command: command.into(),
            args,
            timeout_seconds,
        }
    }
}

#[async_trait]
impl WorkerProcess for ExternalAgentProcess {
    async fn implement(&self, task: &Task, worktree: &Path) -> Result<(), WorkerError> {
        info!(task_id = %task.id, command = %self.command, "spawning agent process");

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .current_dir(worktree)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let wait = child.wait();
        let status = match timeout(Duration::from_secs(self.timeout_seconds as u64), wait).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(task_id = %task.id, "agent process timed out, killing");
                let _ = child.start_kill();
                return Err(WorkerError::Timeout {
                    timeout_seconds: self.timeout_seconds,
                });
            }
        };

        if !status.success() {
            return Err(WorkerError::VerificationFailed {
                tier: 0,
                output: format!("agent process exited with {status}"),
            });
        }
        Ok(())
    }
}

/// Run an arbitrary shell command with a timeout, returning its combined
/// exit status and captured stdout+stderr. Shared by verification tiers,
/// quality gates, and lifecycle hooks.
pub async fn run_with_timeout(
    command: &str,
    cwd: &Path,
    timeout_seconds: u32,
) -> Result<(bool, String), WorkerError> {
    let mut parts = command.split_whitespace();
    let Some(program) = parts.next() else {
        return Ok((false, "empty command".to_string()));
    };
    let args: Vec<&str> = parts.collect();

    let child = Command::new(program)
        .args(&args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let output = match timeout(Duration::from_secs(timeout_seconds as u64), child.wait_with_output()).await {
        Ok(result) => result?,
        Err(_) => return Err(WorkerError::Timeout { timeout_seconds }),
    };

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    Ok((output.status.success(), combined))
}
