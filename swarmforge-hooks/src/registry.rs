//! Dispatches lifecycle events to every registered hook, in registration
//! order, isolating each callback so a panicking or hanging hook never
//! takes the orchestrator down with it.

use crate::events::LifecycleEvent;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

#[async_trait]
pub trait Hook: Send + Sync {
    fn name(&self) -> &str;
    async fn handle(&self, event: &LifecycleEvent);
}

#[derive(Default)]
pub struct HookRegistry {
    hooks: Vec<Arc<dyn Hook>>,
    timeout: Duration,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self {
            hooks: Vec::new(),
            timeout: Duration::from_secs(crate::shell::DEFAULT_HOOK_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            hooks: Vec::new(),
            timeout,
        }
    }

    pub fn register(&mut self, hook: Arc<dyn Hook>) {
        self.hooks.push(hook);
    }

    /// Fire `event` at every registered hook, in registration order. Each
    /// hook runs in its own task under this registry's timeout; a panic or
    /// timeout is logged and otherwise ignored — hooks are observer-only
    /// and must never affect the caller's control flow (spec.md §4.7,
    /// §9 "Hook safety").
    pub async fn dispatch(&self, event: LifecycleEvent) {
        let event = Arc::new(event);
        for hook in &self.hooks {
            let hook = Arc::clone(hook);
            let event = Arc::clone(&event);
            let name = hook.name().to_string();

            let task = tokio::spawn(async move { hook.handle(&event).await });
            match tokio::time::timeout(self.timeout, task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    tracing::warn!(hook = %name, error = %join_err, "hook panicked, ignoring");
                }
                Err(_) => {
                    tracing::warn!(hook = %name, timeout_secs = self.timeout.as_secs(), "hook timed out, ignoring");
                }
            }
        }
    }
}
