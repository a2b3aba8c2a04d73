//! Circuit breaker: stop calling a consistently-failing operation for a
//! cooldown window instead of hammering it.
//!
//! States: `Closed` (normal), `Open` (reject everything until the reset
//! timeout elapses), `HalfOpen` (let a few probes through to test recovery).

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::RwLock;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
#[error("circuit breaker '{}' is open", name.as_deref().unwrap_or("unnamed"))]
pub struct CircuitBreakerOpenError {
    pub name: Option<String>,
    pub stats: CircuitBreakerStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CircuitBreakerConfig {
    pub name: Option<String>,
    pub failure_threshold: u64,
    pub success_threshold: u64,
    pub timeout_ms: Option<u64>,
    pub reset_timeout_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            name: None,
            failure_threshold: 5,
            success_threshold: 3,
            timeout_ms: Some(30_000),
            reset_timeout_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CircuitBreakerStats {
    pub state: CircuitState,
    pub failure_count: u64,
    pub success_count: u64,
    pub total_requests: u64,
    pub last_failure: Option<SystemTime>,
    pub last_success: Option<SystemTime>,
}

pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: AtomicU8,
    failure_count: AtomicU64,
    success_count: AtomicU64,
    total_requests: AtomicU64,
    next_attempt: Arc<RwLock<Instant>>,
    last_failure: Arc<RwLock<Option<SystemTime>>>,
    last_success: Arc<RwLock<Option<SystemTime>>>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            next_attempt: Arc::new(RwLock::new(Instant::now())),
            last_failure: Arc::new(RwLock::new(None)),
            last_success: Arc::new(RwLock::new(None)),
            state: AtomicU8::new(0),
            failure_count: AtomicU64::new(0),
            success_count: AtomicU64::new(0),
            total_requests: AtomicU64::new(0),
            config,
        }
    }

    pub async fn execute<F, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<T, E>> + Send>>,
    {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        if self.get_state() == CircuitState::Open {
            let next_attempt = *self.next_attempt.read().await;
            if Instant::now() < next_attempt {
                return Err(CircuitBreakerError::Open(CircuitBreakerOpenError {
                    name: self.config.name.clone(),
                    stats: self.get_stats().await,
                }));
            }
            self.state.store(2, Ordering::Relaxed);
            self.success_count.store(0, Ordering::Relaxed);
        }

        let result = match self.config.timeout_ms {
            Some(timeout_ms) => match tokio::time::timeout(
                Duration::from_millis(timeout_ms),
                operation(),
            )
            .await
            {
                Ok(result) => result.map_err(CircuitBreakerError::Operation),
                Err(_) => Err(CircuitBreakerError::Timeout),
            },
            None => operation().await.map_err(CircuitBreakerError::Operation),
        };

        match &result {
            Ok(_) => self.on_success().await,
            Err(_) => self.on_failure().await,
        }

        result
    }

    async fn on_success(&self) {
        self.failure_count.store(0, Ordering::Relaxed);
        *self.last_success.write().await = Some(SystemTime::now());

        if self.get_state() == CircuitState::HalfOpen {
            let success_count = self.success_count.fetch_add(1, Ordering::Relaxed) + 1;
            if success_count >= self.config.success_threshold {
                self.state.store(0, Ordering::Relaxed);
                self.success_count.store(0, Ordering::Relaxed);
                info!(name = self.name(), success_count, "circuit breaker closed");
            }
        }
    }

    async fn on_failure(&self) {
        let failure_count = self.failure_count.fetch_add(1, Ordering::Relaxed) + 1;
        *self.last_failure.write().await = Some(SystemTime::now());

        if self.get_state() == CircuitState::HalfOpen || failure_count >= self.config.failure_threshold {
            self.state.store(1, Ordering::Relaxed);
            *self.next_attempt.write().await =
                Instant::now() + Duration::from_millis(self.config.reset_timeout_ms);
            self.success_count.store(0, Ordering::Relaxed);
            warn!(name = self.name(), failure_count, "circuit breaker opened");
        }
    }

    fn name(&self) -> &str {
        self.config.name.as_deref().unwrap_or("unnamed")
    }

    pub fn get_state(&self) -> CircuitState {
        match self.state.load(Ordering::Relaxed) {
            0 => CircuitState::Closed,
            1 => CircuitState::Open,
            _ => CircuitState::HalfOpen,
        }
    }

    pub async fn get_stats(&self) -> CircuitBreakerStats {
        CircuitBreakerStats {
            state: self.get_state(),
            failure_count: self.failure_count.load(Ordering::Relaxed),
            success_count: self.success_count.load(Ordering::Relaxed),
            total_requests: self.total_requests.load(Ordering::Relaxed),
            last_failure: *self.last_failure.read().await,
            last_success: *self.last_success.read().await,
        }
    }

    pub async fn reset(&self) {
        self.state.store(0, Ordering::Relaxed);
        self.failure_count.store(0, Ordering::Relaxed);
        self.success_count.store(0, Ordering::Relaxed);
        *self.last_failure.write().await = None;
        *self.last_success.write().await = None;
        info!(name = self.name(), "circuit breaker reset");
    }

    pub async fn force_open(&self, timeout_ms: Option<u64>) {
        self.state.store(1, Ordering::Relaxed);
        let timeout = timeout_ms.unwrap_or(self.config.reset_timeout_ms);
        *self.next_attempt.write().await = Instant::now() + Duration::from_millis(timeout);
        warn!(name = self.name(), "circuit breaker forced open");
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("state", &self.get_state())
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    #[error(transparent)]
    Open(#[from] CircuitBreakerOpenError),
    #[error("operation timed out")]
    Timeout,
    #[error(transparent)]
    Operation(E),
}
