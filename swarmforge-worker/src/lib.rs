//! Worker protocol (spec.md §4.3): one worker owns one branch/worktree and
//! runs a single-attempt execution loop per claimed task. Retrying a failed
//! task is the Orchestrator's job, not this crate's — see [`runtime`].

pub mod checkpoint;
pub mod commit;
pub mod context;
pub mod error;
pub mod escalation;
pub mod heartbeat;
pub mod ownership;
pub mod process;
pub mod runtime;
pub mod verification;

pub use checkpoint::{checkpoint_commit_message, should_checkpoint, CHECKPOINT_THRESHOLD};
pub use commit::{commit_message, commit_owned_files};
pub use context::{check_preconditions, load_read_context, ContextLoadError};
pub use error::WorkerError;
pub use escalation::{take_escalation_intent, EscalationIntent, ESCALATION_INTENT_FILENAME};
pub use heartbeat::{HeartbeatPublisher, HEARTBEAT_INTERVAL_SECS};
pub use ownership::find_out_of_scope_changes;
pub use process::{run_with_timeout, ExternalAgentProcess, WorkerProcess};
pub use runtime::{execute_task, ExecutionConfig, TaskOutcome};
pub use verification::{verify, VerificationConfig, VerificationReport};
