//! Before/after callbacks around pool operations.
//!
//! Hooks run in priority order (lower number = earlier). A before-hook can
//! refuse an [`HookEvent::Acquire`] or [`HookEvent::Dispose`]; after-hooks
//! only observe. Release hooks are notified after the instance is back in
//! the pool, including when a [`Pooled`](crate::Pooled) handle is dropped
//! without an explicit release, so they are after-only.
//!
//! Under [`ReapPolicy::Expired`](crate::ReapPolicy::Expired) the reaper
//! evicts stale idle instances before it asks the Dispose before-hooks. A
//! hook that cancels the dispose keeps the pool registered, but the evicted
//! instances are already gone.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::pool::PoolId;

// ---------------------------------------------------------------------------
// HookEvent
// ---------------------------------------------------------------------------

/// Pool operations hooks can attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookEvent {
    /// An instance is handed out.
    Acquire,
    /// An instance is returned.
    Release,
    /// A pool is disposed, explicitly or by the reaper.
    Dispose,
}

impl std::fmt::Display for HookEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Acquire => write!(f, "Acquire"),
            Self::Release => write!(f, "Release"),
            Self::Dispose => write!(f, "Dispose"),
        }
    }
}

/// Result of a before-hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookResult {
    /// Let the operation proceed.
    Continue,
    /// Refuse the operation with the given reason.
    Cancel(String),
}

/// Identifies the pool an event fires on.
#[derive(Debug, Clone, Copy)]
pub struct HookTarget<'a> {
    /// Resource type name.
    pub resource: &'a str,
    /// Pool the event concerns.
    pub pool: PoolId,
}

// ---------------------------------------------------------------------------
// PoolHook
// ---------------------------------------------------------------------------

/// A callback attached to pool operations.
///
/// Hooks are invoked outside every pool and registry lock, so they may call
/// back into the pooling API, but they run on the caller's thread and should
/// stay cheap.
pub trait PoolHook: Send + Sync {
    /// Human-readable name, reported when the hook cancels an operation.
    fn name(&self) -> &str;

    /// Priority (lower = runs first). Default: 100.
    fn priority(&self) -> u32 {
        100
    }

    /// Which events this hook responds to.
    fn events(&self) -> Vec<HookEvent>;

    /// Called before the operation.
    fn before(&self, _event: HookEvent, _target: HookTarget<'_>) -> HookResult {
        HookResult::Continue
    }

    /// Called after the operation completes (success or failure).
    fn after(&self, _event: HookEvent, _target: HookTarget<'_>, _success: bool) {}
}

// ---------------------------------------------------------------------------
// HookRegistry
// ---------------------------------------------------------------------------

/// Priority-ordered hook list shared by every pool of a
/// [`Pooling`](crate::Pooling).
pub struct HookRegistry {
    hooks: RwLock<Vec<Arc<dyn PoolHook>>>,
}

impl HookRegistry {
    /// Create a new empty hook registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            hooks: RwLock::new(Vec::new()),
        }
    }

    /// Register a hook. Equal priorities keep registration order.
    pub fn register(&self, hook: Arc<dyn PoolHook>) {
        let mut hooks = self.hooks.write();
        hooks.push(hook);
        hooks.sort_by_key(|h| h.priority());
    }

    /// Number of registered hooks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hooks.read().len()
    }

    /// Whether no hooks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hooks.read().is_empty()
    }

    fn matching(&self, event: HookEvent) -> Vec<Arc<dyn PoolHook>> {
        self.hooks
            .read()
            .iter()
            .filter(|h| h.events().contains(&event))
            .cloned()
            .collect()
    }

    /// Run all matching before-hooks in priority order.
    ///
    /// Short-circuits on the first [`HookResult::Cancel`].
    pub fn run_before(&self, event: HookEvent, target: HookTarget<'_>) -> Result<()> {
        for hook in self.matching(event) {
            if let HookResult::Cancel(reason) = hook.before(event, target) {
                tracing::warn!(
                    hook = hook.name(),
                    resource = target.resource,
                    pool_id = %target.pool,
                    event = %event,
                    %reason,
                    "before-hook cancelled operation"
                );
                return Err(Error::Cancelled {
                    hook: hook.name().to_string(),
                    reason,
                });
            }
        }
        Ok(())
    }

    /// Run all matching after-hooks in priority order.
    pub fn run_after(&self, event: HookEvent, target: HookTarget<'_>, success: bool) {
        for hook in self.matching(event) {
            hook.after(event, target, success);
        }
    }
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("hook_count", &self.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Built-in hooks
// ---------------------------------------------------------------------------

/// Logs every pool event via `tracing::info!`.
///
/// Priority 10 (runs early).
pub struct LoggingHook;

impl PoolHook for LoggingHook {
    fn name(&self) -> &str {
        "logging"
    }

    fn priority(&self) -> u32 {
        10
    }

    fn events(&self) -> Vec<HookEvent> {
        vec![HookEvent::Acquire, HookEvent::Release, HookEvent::Dispose]
    }

    fn before(&self, event: HookEvent, target: HookTarget<'_>) -> HookResult {
        tracing::info!(
            hook = "logging",
            resource = target.resource,
            pool_id = %target.pool,
            event = %event,
            phase = "before",
            "pool hook"
        );
        HookResult::Continue
    }

    fn after(&self, event: HookEvent, target: HookTarget<'_>, success: bool) {
        tracing::info!(
            hook = "logging",
            resource = target.resource,
            pool_id = %target.pool,
            event = %event,
            phase = "after",
            success,
            "pool hook"
        );
    }
}
