#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum HealthError {
    #[error("worker {0} has no recorded heartbeat to evaluate")]
    NoHeartbeat(swarmforge_types::WorkerId),
}
