//! Health Monitor (spec.md §4.4): heartbeat-staleness stall detection and
//! bounded auto-restart signaling. Observes; never mutates task state.

pub mod error;
pub mod monitor;
pub mod watch;

pub use error::HealthError;
pub use monitor::{
    HealthEvent, HealthMonitor, HealthMonitorConfig, HeartbeatSource, DEFAULT_MAX_AUTO_RESTARTS,
    DEFAULT_STALL_THRESHOLD_SECS,
};
pub use watch::run;
