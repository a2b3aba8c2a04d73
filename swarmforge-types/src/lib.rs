//! Shared data model for the swarmforge orchestration core.
//!
//! Every other crate in the workspace depends on this one for the task
//! graph, status enums, worker/feature runtime state, and the escalation
//! and failure-category vocabulary shared across components.

pub mod error;
pub mod escalation;
pub mod feature_state;
pub mod ids;
pub mod status;
pub mod task;
pub mod worker;

pub use error::{CategorizedFailure, FailureCategory};
pub use escalation::{Escalation, EscalationCategory};
pub use feature_state::{FeatureState, LevelRecord, TaskRecord};
pub use ids::{FeatureId, LevelIndex, TaskId, WorkerId};
pub use status::{LevelStatus, TaskStatus, WorkerExitCode, WorkerStatus, WorkerStep};
pub use task::{Level, RawLevel, RawTaskGraph, Task, TaskFiles, TaskGraph, Verification};
pub use worker::{Heartbeat, Worker};
