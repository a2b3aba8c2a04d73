//! Orchestrator configuration: worker-pool sizing, retry/checkpoint
//! thresholds, and the default quality-gate/hook set. Environment
//! overrides follow the `SWARMFORGE_*` convention so a feature can be
//! re-run with different knobs without touching code, matching the
//! source's environment-variable override layer in its own config crate.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Upper bound on worker count regardless of what the caller requests
    /// or what `max_parallelization` allows.
    pub max_count: usize,
    pub max_retries: u32,
    pub stall_threshold_secs: u64,
    pub max_auto_restarts: u32,
    pub health_poll_interval_secs: u64,
    pub graceful_stop_timeout: Duration,
    pub hook_timeout_secs: u64,
    pub syntax_command: Option<String>,
    pub quality_command: Option<String>,
    pub base_branch: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_count: 8,
            max_retries: 3,
            stall_threshold_secs: swarmforge_health::DEFAULT_STALL_THRESHOLD_SECS,
            max_auto_restarts: swarmforge_health::DEFAULT_MAX_AUTO_RESTARTS,
            health_poll_interval_secs: 15,
            graceful_stop_timeout: Duration::from_secs(30),
            hook_timeout_secs: swarmforge_hooks::DEFAULT_HOOK_TIMEOUT_SECS,
            syntax_command: None,
            quality_command: None,
            base_branch: "main".to_string(),
        }
    }
}

impl OrchestratorConfig {
    /// Apply `SWARMFORGE_*` environment overrides on top of the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = env_usize("SWARMFORGE_MAX_WORKERS") {
            config.max_count = v;
        }
        if let Some(v) = env_u32("SWARMFORGE_MAX_RETRIES") {
            config.max_retries = v;
        }
        if let Some(v) = env_u64("SWARMFORGE_STALL_THRESHOLD_SECS") {
            config.stall_threshold_secs = v;
        }
        if let Some(v) = env_u32("SWARMFORGE_MAX_AUTO_RESTARTS") {
            config.max_auto_restarts = v;
        }
        if let Some(v) = env_u64("SWARMFORGE_GRACEFUL_STOP_TIMEOUT_SECS") {
            config.graceful_stop_timeout = Duration::from_secs(v);
        }
        if let Ok(v) = std::env::var("SWARMFORGE_BASE_BRANCH") {
            config.base_branch = v;
        }
        if let Ok(v) = std::env::var("SWARMFORGE_SYNTAX_COMMAND") {
            config.syntax_command = Some(v);
        }
        if let Ok(v) = std::env::var("SWARMFORGE_QUALITY_COMMAND") {
            config.quality_command = Some(v);
        }

        config
    }

    /// Validate internal consistency. Run once at startup; an invalid
    /// config is a programmer/operator error, not a recoverable one.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_count == 0 {
            return Err("max_count must be >= 1".into());
        }
        if self.max_retries == 0 {
            return Err("max_retries must be >= 1".into());
        }
        if self.base_branch.trim().is_empty() {
            return Err("base_branch must not be empty".into());
        }
        Ok(())
    }
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_u32(key: &str) -> Option<u32> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(OrchestratorConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_max_count_is_rejected() {
        let mut config = OrchestratorConfig::default();
        config.max_count = 0;
        assert!(config.validate().is_err());
    }
}
