//! Pool registry: the explicitly owned context that holds every pool.
//!
//! A [`Pooling`] maps `(resource type, construction arguments)` to a
//! [`Pool`], creating pools lazily on first request. It also owns the reaper
//! task that disposes pools left idle, and the hook registry its pools share.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::PoolingConfig;
use crate::error::{Error, Result};
use crate::hooks::{HookRegistry, PoolHook};
use crate::pool::{ErasedPool, Pool, PoolId, Pooled};
use crate::reaper::{self, SweepReport};
use crate::resource::Poolable;

/// Per-type index from construction arguments to pool.
type Index<R> = HashMap<<R as Poolable>::Args, Pool<R>>;

#[derive(Default)]
struct Registry {
    /// Every registered pool, for sweeps and shutdown.
    pools: HashMap<PoolId, Arc<dyn ErasedPool>>,
    /// `TypeId::of::<R>()` -> `Index<R>`.
    by_type: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

fn typed_index<R: Poolable>(
    by_type: &mut HashMap<TypeId, Box<dyn Any + Send + Sync>>,
) -> &mut Index<R> {
    by_type
        .entry(TypeId::of::<R>())
        .or_insert_with(|| Box::new(Index::<R>::new()) as Box<dyn Any + Send + Sync>)
        .downcast_mut::<Index<R>>()
        .expect("index stored under TypeId::of::<R>() must be Index<R>")
}

pub(crate) struct Shared {
    pub(crate) config: PoolingConfig,
    registry: Mutex<Registry>,
    hooks: Arc<HookRegistry>,
    reaper: Mutex<Option<JoinHandle<()>>>,
    reaper_warned: AtomicBool,
    shutdown: CancellationToken,
}

impl Shared {
    /// Remove pool `id` registered under `args`. Returns whether it was
    /// still registered.
    pub(crate) fn unregister<R: Poolable>(&self, args: &R::Args, id: PoolId) -> bool {
        let mut registry = self.registry.lock();
        let removed = registry.pools.remove(&id).is_some();
        if let Some(index) = registry
            .by_type
            .get_mut(&TypeId::of::<R>())
            .and_then(|index| index.downcast_mut::<Index<R>>())
            && index.get(args).is_some_and(|pool| pool.id() == id)
        {
            index.remove(args);
        }
        removed
    }

    /// Copy of the registered pools, taken under the registry lock.
    pub(crate) fn snapshot(&self) -> Vec<Arc<dyn ErasedPool>> {
        self.registry.lock().pools.values().cloned().collect()
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Registry of pools plus the reaper that disposes idle ones.
///
/// Construct one per application (or per test) and shut it down explicitly.
/// Cloning yields another handle to the same registry.
#[derive(Clone)]
pub struct Pooling {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Pooling {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pooling")
            .field("config", &self.shared.config)
            .field("pools", &self.pool_count())
            .field("hooks", &self.shared.hooks)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

impl Pooling {
    /// Create a registry with the given configuration.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] if `config` is invalid.
    pub fn new(config: PoolingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(Shared {
                config,
                registry: Mutex::new(Registry::default()),
                hooks: Arc::new(HookRegistry::new()),
                reaper: Mutex::new(None),
                reaper_warned: AtomicBool::new(false),
                shutdown: CancellationToken::new(),
            }),
        })
    }

    /// The registry configuration.
    #[must_use]
    pub fn config(&self) -> &PoolingConfig {
        &self.shared.config
    }

    /// The hooks shared by every pool of this registry.
    #[must_use]
    pub fn hooks(&self) -> &HookRegistry {
        &self.shared.hooks
    }

    /// Attach a hook to every pool of this registry.
    pub fn register_hook(&self, hook: Arc<dyn PoolHook>) {
        self.shared.hooks.register(hook);
    }

    /// Get the pool for `R` built from `args`, creating it if needed.
    ///
    /// A key whose pool has been disposed gets a fresh pool. Creating the
    /// first pool starts the reaper when a tokio runtime is available.
    ///
    /// # Errors
    /// - [`Error::Configuration`] if `R::pool_size()` or
    ///   `R::scavenge_interval()` is out of range.
    /// - [`Error::Disposed`] after [`shutdown`](Self::shutdown).
    pub fn pool<R: Poolable>(&self, args: R::Args) -> Result<Pool<R>> {
        let shared = &self.shared;
        if shared.shutdown.is_cancelled() {
            return Err(Error::Disposed {
                resource: R::type_name().to_string(),
            });
        }

        let pool = {
            let mut registry = shared.registry.lock();
            let Registry { pools, by_type } = &mut *registry;
            let index = typed_index::<R>(by_type);
            if let Some(existing) = index.get(&args).filter(|pool| !pool.is_disposed()) {
                return Ok(existing.clone());
            }

            let pool = Pool::new(
                args.clone(),
                Arc::downgrade(shared),
                &shared.config,
                Arc::clone(&shared.hooks),
            )?;
            if let Some(stale) = index.insert(args, pool.clone()) {
                pools.remove(&stale.id());
            }
            pools.insert(pool.id(), Arc::new(pool.clone()));
            pool
        };

        tracing::debug!(
            resource = R::type_name(),
            pool_id = %pool.id(),
            args = ?pool.args(),
            max_size = pool.max_size(),
            "registered pool"
        );
        self.ensure_reaper();
        Ok(pool)
    }

    /// Acquire an instance of `R` built from `args`.
    ///
    /// Shorthand for `pool(args)?.acquire()`. If the pool is disposed between
    /// lookup and checkout, a fresh pool is looked up and tried instead.
    pub async fn acquire<R: Poolable>(&self, args: R::Args) -> Result<Pooled<R>> {
        loop {
            let pool = self.pool::<R>(args.clone())?;
            match pool.acquire().await {
                Err(Error::Disposed { .. }) if !self.is_shut_down() => {
                    tracing::trace!(resource = R::type_name(), "pool disposed during acquire, retrying");
                }
                result => return result,
            }
        }
    }

    /// Whether a live pool is registered for `R` and `args`.
    #[must_use]
    pub fn contains<R: Poolable>(&self, args: &R::Args) -> bool {
        self.shared
            .registry
            .lock()
            .by_type
            .get(&TypeId::of::<R>())
            .and_then(|index| index.downcast_ref::<Index<R>>())
            .and_then(|index| index.get(args))
            .is_some_and(|pool| !pool.is_disposed())
    }

    /// Number of registered pools across all resource types.
    #[must_use]
    pub fn pool_count(&self) -> usize {
        self.shared.registry.lock().pools.len()
    }

    /// Run one reaper pass now.
    pub async fn sweep(&self) -> SweepReport {
        reaper::sweep(&self.shared).await
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shared.shutdown.is_cancelled()
    }

    /// Stop the reaper and dispose every registered pool.
    ///
    /// Later calls to [`pool`](Self::pool) fail with [`Error::Disposed`].
    /// Calling it again is a no-op.
    ///
    /// # Errors
    /// Returns the first dispose failure, after every pool has been processed.
    pub async fn shutdown(&self) -> Result<()> {
        self.shared.shutdown.cancel();

        let handle = self.shared.reaper.lock().take();
        if let Some(handle) = handle
            && let Err(err) = handle.await
        {
            tracing::warn!(error = %err, "pool reaper ended abnormally");
        }

        let pools = self.shared.snapshot();
        let count = pools.len();
        let mut first_error = None;
        for pool in pools {
            if let Err(err) = pool.dispose_boxed().await {
                tracing::warn!(
                    resource = pool.resource(),
                    pool_id = %pool.id(),
                    error = %err,
                    "failed to dispose pool during shutdown"
                );
                first_error.get_or_insert(err);
            }
        }

        tracing::info!(pools = count, "pooling shut down");
        first_error.map_or(Ok(()), Err)
    }

    fn ensure_reaper(&self) {
        let shared = &self.shared;
        let mut slot = shared.reaper.lock();
        if shared.shutdown.is_cancelled() || slot.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let interval = shared.config.scavenger_interval;
                *slot = Some(runtime.spawn(reaper::run(
                    Arc::downgrade(shared),
                    shared.shutdown.clone(),
                    interval,
                )));
                tracing::debug!(interval_ms = interval.as_millis() as u64, "started pool reaper");
            }
            Err(_) => {
                if !shared.reaper_warned.swap(true, Ordering::Relaxed) {
                    tracing::warn!(
                        "no tokio runtime, pool reaper not started; call Pooling::sweep to reap idle pools"
                    );
                }
            }
        }
    }
}
