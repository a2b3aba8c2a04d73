//! Cross-cutting resilience primitives shared by the orchestrator, worker
//! runtime, and merge coordinator: retry with backoff, circuit breaking, and
//! the one shared `tracing` init entry point.
//!
//! Heartbeat-staleness health checking lives in `swarmforge-health` instead
//! of here — this crate covers generic fault tolerance, not the
//! feature-specific worker liveness model.

pub mod circuit_breaker;
pub mod logging;
pub mod retry;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerOpenError,
    CircuitBreakerStats, CircuitState,
};
pub use logging::{init_tracing, LogContext, LogFormat};
pub use retry::{
    retry, retry_with_policy, DefaultRetryPolicy, RetryConfig, RetryError, RetryExecutor,
    RetryPolicy,
};
