use swarmforge_types::TaskId;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StateError {
    #[error("task '{0}' not found")]
    TaskNotFound(TaskId),

    #[error("failed to write snapshot: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to (de)serialize snapshot: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("snapshot at {path} is corrupt and no usable backup exists: {detail}")]
    Corrupt { path: String, detail: String },

    #[error("failed to persist temp file into place: {0}")]
    Persist(#[from] tempfile::PersistError),
}
