//! Bridges the State Manager's in-memory worker records to
//! [`swarmforge_health::HeartbeatSource`], so the Health Monitor (a crate
//! that must stay ignorant of `swarmforge-state`'s storage model) can poll
//! staleness without either crate depending on the other's internals.

use std::sync::Arc;
use swarmforge_health::HeartbeatSource;
use swarmforge_state::StateManager;
use swarmforge_types::{TaskId, WorkerId};

pub struct StateHeartbeatSource {
    state: Arc<StateManager>,
}

impl StateHeartbeatSource {
    pub fn new(state: Arc<StateManager>) -> Self {
        Self { state }
    }
}

impl HeartbeatSource for StateHeartbeatSource {
    fn last_heartbeat(&self, worker_id: WorkerId) -> Option<chrono::DateTime<chrono::Utc>> {
        self.state.get_worker(worker_id).map(|w| w.last_heartbeat_at)
    }

    fn current_task(&self, worker_id: WorkerId) -> Option<TaskId> {
        self.state.get_worker(worker_id).and_then(|w| w.current_task_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarmforge_types::Heartbeat;
    use swarmforge_types::WorkerStep;

    #[test]
    fn unknown_worker_has_no_heartbeat_or_task() {
        let dir = tempfile::tempdir().unwrap();
        let state =
            Arc::new(StateManager::open_or_restore("demo", dir.path().join("state.json")).unwrap());
        let bridge = StateHeartbeatSource::new(state);

        assert!(bridge.last_heartbeat(WorkerId(0)).is_none());
        assert!(bridge.current_task(WorkerId(0)).is_none());
    }

    #[test]
    fn bridge_reflects_recorded_heartbeats() {
        let dir = tempfile::tempdir().unwrap();
        let state =
            Arc::new(StateManager::open_or_restore("demo", dir.path().join("state.json")).unwrap());
        let heartbeat = Heartbeat {
            worker_id: WorkerId(0),
            timestamp: chrono::Utc::now(),
            task_id: Some(TaskId::from("T1")),
            step: WorkerStep::Implementing,
            progress_pct: 40.0,
        };
        state.record_worker_heartbeat(&heartbeat, dir.path().join("w0"), "demo/worker-0".into());

        let bridge = StateHeartbeatSource::new(state);
        assert_eq!(bridge.last_heartbeat(WorkerId(0)), Some(heartbeat.timestamp));
        assert_eq!(bridge.current_task(WorkerId(0)), Some(TaskId::from("T1")));
    }
}
