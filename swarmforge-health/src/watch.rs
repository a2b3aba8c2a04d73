//! Polls a [`HealthMonitor`] on an interval and forwards events to the
//! Orchestrator's health channel (spec.md §4.4: "runs concurrently with the
//! Orchestrator loop").

use crate::monitor::{HealthMonitor, HeartbeatSource};
use swarmforge_types::WorkerId;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};

/// Runs until `worker_ids` returns an empty slice or the channel's receiver
/// is dropped. `worker_ids` is a closure rather than a fixed slice because
/// the active worker set shrinks and grows across a run's lifetime.
pub async fn run(
    monitor: HealthMonitor,
    source: std::sync::Arc<dyn HeartbeatSource>,
    worker_ids: impl Fn() -> Vec<WorkerId>,
    poll_interval_secs: u64,
    events: mpsc::Sender<crate::monitor::HealthEvent>,
) {
    let mut ticker = interval(Duration::from_secs(poll_interval_secs));
    loop {
        ticker.tick().await;
        let ids = worker_ids();
        if ids.is_empty() {
            continue;
        }
        for event in monitor.poll(source.as_ref(), &ids) {
            if events.send(event).await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::{HealthMonitorConfig, HeartbeatSource};
    use chrono::{DateTime, Utc};
    use std::sync::Arc;
    use swarmforge_types::TaskId;

    struct StalledSource;

    impl HeartbeatSource for StalledSource {
        fn last_heartbeat(&self, _worker_id: WorkerId) -> Option<DateTime<Utc>> {
            Some(Utc::now() - chrono::Duration::seconds(200))
        }
        fn current_task(&self, _worker_id: WorkerId) -> Option<TaskId> {
            Some(TaskId::from("T1"))
        }
    }

    #[tokio::test]
    async fn run_forwards_stall_events_until_the_worker_set_empties() {
        let monitor = HealthMonitor::new(HealthMonitorConfig {
            stall_threshold_secs: 120,
            max_auto_restarts: 2,
        });
        let (tx, mut rx) = mpsc::channel(4);
        let worker_ids = Arc::new(std::sync::atomic::AtomicBool::new(true));
        let flag = worker_ids.clone();

        let handle = tokio::spawn(async move {
            run(
                monitor,
                Arc::new(StalledSource),
                move || {
                    if flag.load(std::sync::atomic::Ordering::SeqCst) {
                        vec![WorkerId(0)]
                    } else {
                        vec![]
                    }
                },
                1,
                tx,
            )
            .await;
        });

        let event = rx.recv().await.unwrap();
        assert!(matches!(
            event,
            crate::monitor::HealthEvent::Stalled {
                worker_id: WorkerId(0),
                ..
            }
        ));

        worker_ids.store(false, std::sync::atomic::Ordering::SeqCst);
        drop(rx);
        handle.await.unwrap();
    }
}
