use swarmforge_types::WorkerId;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum MergeError {
    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("blocking task panicked: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("level {level} is not complete: {incomplete} task(s) not COMPLETED")]
    LevelIncomplete { level: u32, incomplete: usize },

    #[error("merge conflict merging worker {worker_id}'s branch into staging: {paths:?}")]
    MergeConflict {
        worker_id: WorkerId,
        paths: Vec<String>,
    },

    #[error("required quality gate '{name}' did not pass: {outcome:?}")]
    GateFailed {
        name: String,
        outcome: crate::gate::GateOutcome,
    },
}
