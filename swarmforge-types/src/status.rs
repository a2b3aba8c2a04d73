//! Task/worker/level status enums and their legal transitions (spec.md §3).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Blocked,
    Failed,
    Paused,
}

impl TaskStatus {
    /// Whether `self -> next` is a legal transition per spec.md §3.
    ///
    /// ```text
    /// PENDING -> IN_PROGRESS -> COMPLETED
    /// IN_PROGRESS -> FAILED -> PENDING (retry)
    /// FAILED -> BLOCKED (max retries)
    /// IN_PROGRESS -> PAUSED (checkpoint); PAUSED -> IN_PROGRESS (resume)
    /// ```
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress)
                | (InProgress, Completed)
                | (InProgress, Failed)
                | (Failed, Pending)
                | (Failed, Blocked)
                | (InProgress, Paused)
                | (Paused, InProgress)
        )
    }

    pub fn is_terminal_for_level(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Blocked)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerStatus {
    Starting,
    Running,
    Idle,
    Checkpoint,
    Stalled,
    Crashed,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LevelStatus {
    Pending,
    Running,
    GatesRunning,
    Merged,
    Failed,
}

/// A worker's heartbeat step (spec.md §4.3 step 10 / §6 heartbeat artifact).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStep {
    Initializing,
    LoadingContext,
    Implementing,
    VerifyingTier1,
    VerifyingTier2,
    VerifyingTier3,
    Committing,
    Idle,
}

/// Worker exit codes — the contract with the Orchestrator (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExitCode {
    Success = 0,
    Error = 1,
    Checkpoint = 2,
    Blocked = 3,
    Escalation = 4,
    Interrupted = 130,
}

impl WorkerExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn from_i32(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Success),
            1 => Some(Self::Error),
            2 => Some(Self::Checkpoint),
            3 => Some(Self::Blocked),
            4 => Some(Self::Escalation),
            130 => Some(Self::Interrupted),
            _ => None,
        }
    }
}
