//! Stall detection (spec.md §4.4).
//!
//! The monitor never mutates task status itself — it only signals the
//! Orchestrator, which applies the resulting state change through the State
//! Manager's single-writer discipline. Keeping this crate free of a
//! dependency on `swarmforge-state`/`swarmforge-worker` is what makes that
//! separation enforceable rather than just documented.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use swarmforge_types::{TaskId, WorkerId};

/// A worker is `STALLED` once its last heartbeat is older than this.
pub const DEFAULT_STALL_THRESHOLD_SECS: u64 = 120;

/// Stalled workers are auto-restarted this many times before the Orchestrator
/// gives up and fails the in-flight task instead.
pub const DEFAULT_MAX_AUTO_RESTARTS: u32 = 2;

/// Supplies the last-seen heartbeat for a worker. Implemented by the caller
/// (typically backed by the worker runtime's heartbeat artifacts or the
/// State Manager's in-memory worker records) so this crate stays agnostic
/// about where heartbeats actually live.
pub trait HeartbeatSource: Send + Sync {
    fn last_heartbeat(&self, worker_id: WorkerId) -> Option<DateTime<Utc>>;
    fn current_task(&self, worker_id: WorkerId) -> Option<TaskId>;
}

/// What the Orchestrator should do about a worker the monitor just flagged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    /// Heartbeat is stale; this many auto-restarts have been attempted so
    /// far (including this one). The Orchestrator should restart the worker.
    Stalled {
        worker_id: WorkerId,
        task_id: Option<TaskId>,
        restart_attempt: u32,
    },
    /// The worker has been restarted `DEFAULT_MAX_AUTO_RESTARTS` times and is
    /// still stalled. The Orchestrator must terminate it and fail the
    /// in-flight task back to `PENDING`.
    RestartsExhausted {
        worker_id: WorkerId,
        task_id: Option<TaskId>,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct HealthMonitorConfig {
    pub stall_threshold_secs: u64,
    pub max_auto_restarts: u32,
}

impl Default for HealthMonitorConfig {
    fn default() -> Self {
        Self {
            stall_threshold_secs: DEFAULT_STALL_THRESHOLD_SECS,
            max_auto_restarts: DEFAULT_MAX_AUTO_RESTARTS,
        }
    }
}

/// Tracks per-worker restart attempts across successive polls. A worker that
/// produces a fresh heartbeat resets its counter — staleness has to be
/// continuous to exhaust the restart budget.
pub struct HealthMonitor {
    config: HealthMonitorConfig,
    restart_counts: DashMap<WorkerId, u32>,
}

impl HealthMonitor {
    pub fn new(config: HealthMonitorConfig) -> Self {
        Self {
            config,
            restart_counts: DashMap::new(),
        }
    }

    /// Evaluate every worker in `worker_ids` against `source` and return the
    /// events the Orchestrator needs to act on. Workers with a fresh
    /// heartbeat produce no event.
    pub fn poll(&self, source: &dyn HeartbeatSource, worker_ids: &[WorkerId]) -> Vec<HealthEvent> {
        let now = Utc::now();
        let mut events = Vec::new();

        for &worker_id in worker_ids {
            let Some(last_seen) = source.last_heartbeat(worker_id) else {
                continue;
            };
            let stale = now.signed_duration_since(last_seen).num_seconds()
                >= self.config.stall_threshold_secs as i64;

            if !stale {
                self.restart_counts.remove(&worker_id);
                continue;
            }

            let task_id = source.current_task(worker_id);
            let mut attempts = self.restart_counts.entry(worker_id).or_insert(0);
            *attempts += 1;

            if *attempts > self.config.max_auto_restarts {
                drop(attempts);
                self.restart_counts.remove(&worker_id);
                tracing::warn!(%worker_id, "worker exhausted auto-restart budget, failing in-flight task");
                events.push(HealthEvent::RestartsExhausted { worker_id, task_id });
            } else {
                tracing::warn!(%worker_id, restart_attempt = *attempts, "worker stalled, requesting restart");
                events.push(HealthEvent::Stalled {
                    worker_id,
                    task_id,
                    restart_attempt: *attempts,
                });
            }
        }

        events
    }
}
