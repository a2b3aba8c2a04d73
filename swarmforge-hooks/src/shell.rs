//! Shell-backed hooks (spec.md §4.7: "Registered shell hooks run as child
//! processes with a time limit (default 60s)").

use crate::events::LifecycleEvent;
use crate::registry::Hook;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

pub const DEFAULT_HOOK_TIMEOUT_SECS: u64 = 60;

/// Runs `command` with the event JSON piped to stdin. The registry already
/// bounds dispatch with its own timeout; `timeout_seconds` additionally
/// bounds the subprocess itself so a hook that ignores SIGTERM-equivalent
/// cancellation still gets killed.
pub struct ShellHook {
    name: String,
    command: String,
    args: Vec<String>,
    timeout_seconds: u64,
}

impl ShellHook {
    pub fn new(name: impl Into<String>, command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args,
            timeout_seconds: DEFAULT_HOOK_TIMEOUT_SECS,
        }
    }

    pub fn with_timeout_seconds(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }
}

#[async_trait]
impl Hook for ShellHook {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, event: &LifecycleEvent) {
        let payload = match serde_json::to_vec(event) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(hook = %self.name, %err, "failed to serialize event for hook");
                return;
            }
        };

        let mut child = match Command::new(&self.command)
            .args(&self.args)
            .env("SWARMFORGE_EVENT", event.name())
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(err) => {
                tracing::warn!(hook = %self.name, %err, "failed to spawn hook process");
                return;
            }
        };

        if let Some(mut stdin) = child.stdin.take() {
            let _ = stdin.write_all(&payload).await;
        }

        let wait = child.wait_with_output();
        match tokio::time::timeout(Duration::from_secs(self.timeout_seconds), wait).await {
            Ok(Ok(output)) if !output.status.success() => {
                tracing::warn!(
                    hook = %self.name,
                    status = %output.status,
                    stderr = %String::from_utf8_lossy(&output.stderr),
                    "hook process exited non-zero"
                );
            }
            Ok(Ok(_)) => {}
            Ok(Err(err)) => {
                tracing::warn!(hook = %self.name, %err, "hook process error");
            }
            Err(_) => {
                tracing::warn!(hook = %self.name, timeout_seconds = self.timeout_seconds, "hook process timed out");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passing_hook_runs_without_panic() {
        let hook = ShellHook::new("noop", "true", vec![]);
        hook.handle(&LifecycleEvent::ExecutionStarted {
            feature_id: "demo".into(),
            worker_count: 1,
            at: chrono::Utc::now(),
        })
        .await;
    }

    #[tokio::test]
    async fn slow_hook_is_killed_by_its_own_timeout() {
        let hook = ShellHook::new("slow", "sleep", vec!["5".into()]).with_timeout_seconds(1);
        let start = std::time::Instant::now();
        hook.handle(&LifecycleEvent::ExecutionStarted {
            feature_id: "demo".into(),
            worker_count: 1,
            at: chrono::Utc::now(),
        })
        .await;
        assert!(start.elapsed() < Duration::from_secs(3));
    }
}
