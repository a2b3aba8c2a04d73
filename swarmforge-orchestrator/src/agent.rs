//! Wraps the configured external-agent command so it can be handed to
//! [`swarmforge_worker::execute_task`] as a [`WorkerProcess`] without every
//! call site re-deriving the per-task timeout.

use async_trait::async_trait;
use std::path::Path;
use swarmforge_worker::{ExternalAgentProcess, WorkerError, WorkerProcess};
use swarmforge_types::Task;

/// Spawns `command args...` per task, bounding it by that task's own
/// `verification.timeout_seconds` rather than one fixed timeout for every
/// task in the feature.
pub struct ConfiguredAgentProcess {
    pub command: String,
    pub args: Vec<String>,
}

#[async_trait]
impl WorkerProcess for ConfiguredAgentProcess {
    async fn implement(&self, task: &Task, worktree: &Path) -> Result<(), WorkerError> {
        let inner = ExternalAgentProcess::new(
            self.command.clone(),
            self.args.clone(),
            task.verification.timeout_seconds,
        );
        inner.implement(task, worktree).await
    }
}

/// Used when no real agent command is configured (diagnostic/dry-run mode,
/// and in tests): treats every task's worktree as already implemented,
/// i.e. it is a no-op that always succeeds.
pub struct NoopAgentProcess;

#[async_trait]
impl WorkerProcess for NoopAgentProcess {
    async fn implement(&self, _task: &Task, _worktree: &Path) -> Result<(), WorkerError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarmforge_types::{TaskId, Verification};

    fn task_with_timeout(timeout_seconds: u32) -> Task {
        Task {
            id: TaskId::from("T1"),
            title: "t".into(),
            description: String::new(),
            level: 1,
            dependencies: Default::default(),
            files: Default::default(),
            verification: Verification {
                command: "true".into(),
                timeout_seconds,
            },
            integration_test: None,
            estimate_minutes: None,
        }
    }

    #[tokio::test]
    async fn noop_agent_never_touches_the_worktree() {
        let dir = tempfile::tempdir().unwrap();
        NoopAgentProcess
            .implement(&task_with_timeout(5), dir.path())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn configured_agent_bounds_by_the_task_own_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let agent = ConfiguredAgentProcess {
            command: "sleep".into(),
            args: vec!["5".into()],
        };
        let err = agent
            .implement(&task_with_timeout(1), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::Timeout { timeout_seconds: 1 }));
    }
}
