//! Keyed pool of reusable instances.
//!
//! A [`Pool<R>`] hands out at most `R::pool_size()` instances at a time. Idle
//! instances are reused before new ones are constructed; when the pool is
//! full, `acquire` parks until a holder releases or the deadline passes.
//!
//! Each pool guards its idle list and reserved count with a single
//! `parking_lot::Mutex` that is never held across an `.await`: construction
//! and disposal always happen outside it.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::config::{PoolingConfig, ReapPolicy};
use crate::error::{Error, Result};
use crate::hooks::{HookEvent, HookRegistry, HookTarget};
use crate::registry::Shared as RegistryShared;
use crate::resource::Poolable;

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

// ---------------------------------------------------------------------------
// PoolId / PoolState / PoolStats
// ---------------------------------------------------------------------------

/// Process-unique pool identifier.
///
/// Checked-out instances are stamped with the id of the pool they came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolId(u64);

impl PoolId {
    fn next() -> Self {
        Self(NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Wrap a raw id.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw numeric id.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a pool. The transition is one-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    /// Registered and serving acquire/release.
    Active,
    /// Flushed and removed from the registry.
    Disposed,
}

/// Pool statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Total successful acquisitions.
    pub total_acquisitions: u64,
    /// Total instances returned to the pool.
    pub total_releases: u64,
    /// Total instances ever constructed.
    pub created: u64,
    /// Total instances passed to the dispose hook.
    pub disposed: u64,
    /// Instances currently checked out.
    pub reserved: usize,
    /// Instances currently idle.
    pub available: usize,
}

// ---------------------------------------------------------------------------
// Pool internals
// ---------------------------------------------------------------------------

/// An idle instance.
struct Slot<R> {
    instance: R,
    /// Pool that checked the instance in. Checkout refuses a slot stamped by
    /// any other pool; only broken bookkeeping can produce one.
    owner: Option<PoolId>,
    last_used: Instant,
}

impl<R> Slot<R> {
    fn idle(instance: R, owner: PoolId) -> Self {
        Self {
            instance,
            owner: Some(owner),
            last_used: Instant::now(),
        }
    }
}

struct Inner<R> {
    available: Vec<Slot<R>>,
    reserved_count: usize,
    state: PoolState,
    stats: PoolStats,
}

impl<R> Inner<R> {
    fn size(&self) -> usize {
        self.available.len() + self.reserved_count
    }
}

/// Outcome of one locked checkout attempt.
enum Checkout<R> {
    /// An idle instance was taken.
    Ready(R),
    /// A slot was reserved; the caller must construct the instance.
    Construct,
    /// The pool is at capacity.
    Full,
    /// An idle instance was stamped by another pool. It is no longer
    /// counted and must be disposed by the caller.
    Foreign { instance: R, found: PoolId },
}

pub(crate) struct PoolShared<R: Poolable> {
    id: PoolId,
    args: R::Args,
    max_size: usize,
    scavenge_interval: Duration,
    acquire_timeout: Option<Duration>,
    retry_interval: Duration,
    inner: Mutex<Inner<R>>,
    /// Woken whenever capacity frees up or the pool is disposed.
    released: Notify,
    hooks: Arc<HookRegistry>,
    registry: Weak<RegistryShared>,
}

impl<R: Poolable> PoolShared<R> {
    fn target(&self) -> HookTarget<'static> {
        HookTarget {
            resource: R::type_name(),
            pool: self.id,
        }
    }

    fn disposed_error(&self) -> Error {
        Error::Disposed {
            resource: R::type_name().to_string(),
        }
    }

    fn try_checkout(&self) -> Result<Checkout<R>> {
        let mut inner = self.inner.lock();
        if inner.state == PoolState::Disposed {
            return Err(self.disposed_error());
        }

        if let Some(slot) = inner.available.pop() {
            if let Some(found) = slot.owner.filter(|owner| *owner != self.id) {
                return Ok(Checkout::Foreign {
                    instance: slot.instance,
                    found,
                });
            }
            inner.reserved_count += 1;
            inner.stats.total_acquisitions += 1;
            return Ok(Checkout::Ready(slot.instance));
        }

        if inner.size() < self.max_size {
            inner.reserved_count += 1;
            return Ok(Checkout::Construct);
        }

        Ok(Checkout::Full)
    }

    /// Put a checked-out instance back on the idle list.
    fn check_in(&self, instance: R) -> Result<()> {
        let rejected = {
            let mut inner = self.inner.lock();
            inner.reserved_count = inner.reserved_count.saturating_sub(1);
            inner.stats.total_releases += 1;
            match inner.state {
                PoolState::Active => {
                    inner.available.push(Slot::idle(instance, self.id));
                    None
                }
                PoolState::Disposed => Some(instance),
            }
        };

        let target = self.target();
        match rejected {
            None => {
                self.released.notify_one();
                tracing::trace!(resource = target.resource, pool_id = %self.id, "instance released");
                self.hooks.run_after(HookEvent::Release, target, true);
                Ok(())
            }
            Some(instance) => {
                drop(instance);
                tracing::debug!(
                    resource = target.resource,
                    pool_id = %self.id,
                    "instance returned to a disposed pool, dropping it"
                );
                self.hooks.run_after(HookEvent::Release, target, false);
                Err(self.disposed_error())
            }
        }
    }

    /// Give back a slot reserved for construction.
    fn cancel_reservation(&self) {
        {
            let mut inner = self.inner.lock();
            inner.reserved_count = inner.reserved_count.saturating_sub(1);
        }
        self.released.notify_one();
    }

    /// Move the pool to `Disposed` if `eligible` holds, draining its idle
    /// instances. Returns `None` if the pool was already disposed or not
    /// eligible.
    fn retire(&self, eligible: impl FnOnce(&Inner<R>) -> bool) -> Option<Vec<R>> {
        let idle = {
            let mut inner = self.inner.lock();
            if inner.state == PoolState::Disposed || !eligible(&inner) {
                return None;
            }
            inner.state = PoolState::Disposed;
            inner
                .available
                .drain(..)
                .map(|slot| slot.instance)
                .collect()
        };
        // Waiters must observe the new state instead of parking until timeout.
        self.released.notify_waiters();
        Some(idle)
    }
}

/// Holds a slot reserved for construction; returns it unless disarmed.
///
/// Keeps the reserved count right when construction fails or the acquiring
/// future is dropped mid-construction.
struct Reservation<'a, R: Poolable> {
    shared: &'a PoolShared<R>,
    armed: bool,
}

impl<R: Poolable> Reservation<'_, R> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl<R: Poolable> Drop for Reservation<'_, R> {
    fn drop(&mut self) {
        if self.armed {
            self.shared.cancel_reservation();
        }
    }
}

// ---------------------------------------------------------------------------
// Pool<R>
// ---------------------------------------------------------------------------

/// Pool of `R` instances built from one set of construction arguments.
///
/// Obtain one through [`Pooling::pool`](crate::Pooling::pool). Cloning is
/// cheap and yields a handle to the same pool.
pub struct Pool<R: Poolable> {
    shared: Arc<PoolShared<R>>,
}

impl<R: Poolable> Clone for Pool<R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<R: Poolable> fmt::Debug for Pool<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (available, reserved_count, state) = {
            let inner = self.shared.inner.lock();
            (inner.available.len(), inner.reserved_count, inner.state)
        };
        let name = format!("Pool<{}>", R::type_name());
        f.debug_struct(&name)
            .field("id", &self.shared.id)
            .field("args", &self.shared.args)
            .field("available", &available)
            .field("reserved_count", &reserved_count)
            .field("max_size", &self.shared.max_size)
            .field("state", &state)
            .finish()
    }
}

impl<R: Poolable> Pool<R> {
    pub(crate) fn new(
        args: R::Args,
        registry: Weak<RegistryShared>,
        config: &PoolingConfig,
        hooks: Arc<HookRegistry>,
    ) -> Result<Self> {
        let max_size = R::pool_size();
        if max_size == 0 {
            return Err(Error::configuration(format!(
                "pool_size for '{}' must be at least 1",
                R::type_name()
            )));
        }
        let scavenge_interval = R::scavenge_interval();
        if scavenge_interval < Duration::from_secs(1) {
            return Err(Error::configuration(format!(
                "scavenge_interval for '{}' must be at least one second",
                R::type_name()
            )));
        }

        Ok(Self {
            shared: Arc::new(PoolShared {
                id: PoolId::next(),
                args,
                max_size,
                scavenge_interval,
                acquire_timeout: config.acquire_timeout,
                retry_interval: config.retry_interval,
                inner: Mutex::new(Inner {
                    available: Vec::with_capacity(max_size),
                    reserved_count: 0,
                    state: PoolState::Active,
                    stats: PoolStats::default(),
                }),
                released: Notify::new(),
                hooks,
                registry,
            }),
        })
    }

    /// Acquire an instance, waiting up to the configured acquire timeout.
    pub async fn acquire(&self) -> Result<Pooled<R>> {
        self.acquire_timeout(self.shared.acquire_timeout).await
    }

    /// Acquire an instance, waiting up to `timeout` for capacity.
    ///
    /// `None` waits until a holder releases. Waiters are not served in any
    /// particular order.
    ///
    /// # Errors
    /// - [`Error::Exhausted`] if the pool stayed full until the deadline.
    /// - [`Error::Disposed`] if the pool is or becomes disposed.
    /// - [`Error::CrossPool`] if an idle instance is still claimed by another pool.
    /// - Whatever `R::create` returns when construction fails.
    pub async fn acquire_timeout(&self, timeout: Option<Duration>) -> Result<Pooled<R>> {
        let target = self.shared.target();
        self.shared.hooks.run_before(HookEvent::Acquire, target)?;
        let result = self.checkout(timeout).await;
        self.shared
            .hooks
            .run_after(HookEvent::Acquire, target, result.is_ok());
        result
    }

    async fn checkout(&self, timeout: Option<Duration>) -> Result<Pooled<R>> {
        let shared = &self.shared;
        let started = Instant::now();
        let deadline = timeout.map(|t| started + t);

        loop {
            // Register interest before looking so a release between the
            // check and the wait is not missed.
            let notified = shared.released.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match shared.try_checkout()? {
                Checkout::Ready(instance) => {
                    tracing::trace!(resource = R::type_name(), pool_id = %shared.id, "reusing idle instance");
                    return Ok(self.handout(instance));
                }
                Checkout::Construct => return self.construct().await,
                Checkout::Foreign { instance, found } => {
                    tracing::error!(
                        resource = R::type_name(),
                        pool_id = %shared.id,
                        owner = %found,
                        "idle instance is stamped by another pool, disposing it"
                    );
                    // Failures are logged by dispose_instances.
                    let _ = self.dispose_instances(vec![instance]).await;
                    shared.released.notify_one();
                    return Err(Error::CrossPool {
                        resource: R::type_name().to_string(),
                        expected: shared.id.as_u64(),
                        found: found.as_u64(),
                    });
                }
                Checkout::Full => {}
            }

            let wait = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        let waited = started.elapsed();
                        tracing::warn!(
                            resource = R::type_name(),
                            pool_id = %shared.id,
                            max_size = shared.max_size,
                            waited_ms = waited.as_millis() as u64,
                            "pool exhausted"
                        );
                        return Err(Error::Exhausted {
                            resource: R::type_name().to_string(),
                            max_size: shared.max_size,
                            waited_ms: waited.as_millis() as u64,
                        });
                    }
                    shared.retry_interval.min(deadline - now)
                }
                None => shared.retry_interval,
            };
            let _ = tokio::time::timeout(wait, notified).await;
        }
    }

    async fn construct(&self) -> Result<Pooled<R>> {
        let shared = &self.shared;
        let reservation = Reservation {
            shared,
            armed: true,
        };

        let instance = match R::create(&shared.args).await {
            Ok(instance) => instance,
            Err(err) => {
                tracing::warn!(
                    resource = R::type_name(),
                    pool_id = %shared.id,
                    error = %err,
                    "failed to construct pooled instance"
                );
                return Err(err);
            }
        };

        let disposed = {
            let mut inner = shared.inner.lock();
            if inner.state == PoolState::Disposed {
                true
            } else {
                inner.stats.created += 1;
                inner.stats.total_acquisitions += 1;
                false
            }
        };
        if disposed {
            drop(reservation);
            if let Err(err) = R::dispose(instance).await {
                tracing::warn!(resource = R::type_name(), error = %err, "dispose hook failed");
            }
            return Err(shared.disposed_error());
        }

        reservation.disarm();
        tracing::debug!(
            resource = R::type_name(),
            pool_id = %shared.id,
            args = ?shared.args,
            "constructed pooled instance"
        );
        Ok(self.handout(instance))
    }

    fn handout(&self, instance: R) -> Pooled<R> {
        Pooled {
            instance: Some(instance),
            owner: Arc::clone(&self.shared),
            checked_out_at: Instant::now(),
        }
    }

    fn check_owner(&self, item: &Pooled<R>) -> Result<()> {
        let owner = item.owner.id;
        if owner == self.shared.id {
            return Ok(());
        }
        tracing::warn!(
            resource = R::type_name(),
            pool_id = %self.shared.id,
            owner = %owner,
            "instance released to a pool that does not own it"
        );
        Err(Error::OrphanedObject {
            resource: R::type_name().to_string(),
            pool: self.shared.id.as_u64(),
            owner: owner.as_u64(),
        })
    }

    /// Return a checked-out instance so the next `acquire` can reuse it.
    ///
    /// # Errors
    /// - [`Error::OrphanedObject`] if `item` came from another pool. This
    ///   pool's counts are left unchanged and `item` goes back to its owner.
    /// - [`Error::Disposed`] if this pool was disposed while `item` was out.
    ///   The instance is dropped.
    pub fn release(&self, mut item: Pooled<R>) -> Result<()> {
        self.check_owner(&item)?;
        let instance = item.take();
        self.shared.check_in(instance)
    }

    /// Take a checked-out instance out of the pool for good.
    ///
    /// The slot it occupied becomes free for a new construction.
    ///
    /// # Errors
    /// [`Error::OrphanedObject`] if `item` came from another pool.
    pub fn delete(&self, mut item: Pooled<R>) -> Result<R> {
        self.check_owner(&item)?;
        let instance = item.take();
        {
            let mut inner = self.shared.inner.lock();
            inner.reserved_count = inner.reserved_count.saturating_sub(1);
        }
        self.shared.released.notify_one();
        Ok(instance)
    }

    /// Idle plus reserved instances.
    #[must_use]
    pub fn size(&self) -> usize {
        self.shared.inner.lock().size()
    }

    /// Alias for [`size`](Self::size).
    #[must_use]
    pub fn len(&self) -> usize {
        self.size()
    }

    /// Whether the pool holds no instances at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Instances currently checked out.
    #[must_use]
    pub fn reserved_count(&self) -> usize {
        self.shared.inner.lock().reserved_count
    }

    /// Instances currently idle.
    #[must_use]
    pub fn available_count(&self) -> usize {
        self.shared.inner.lock().available.len()
    }

    /// Capacity, from `R::pool_size()`.
    #[must_use]
    pub fn max_size(&self) -> usize {
        self.shared.max_size
    }

    /// Construction arguments this pool builds instances from.
    #[must_use]
    pub fn args(&self) -> &R::Args {
        &self.shared.args
    }

    /// This pool's id.
    #[must_use]
    pub fn id(&self) -> PoolId {
        self.shared.id
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> PoolState {
        self.shared.inner.lock().state
    }

    /// Whether the pool has been disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.state() == PoolState::Disposed
    }

    /// Snapshot of the pool's counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let inner = self.shared.inner.lock();
        PoolStats {
            reserved: inner.reserved_count,
            available: inner.available.len(),
            ..inner.stats.clone()
        }
    }

    /// Dispose every idle instance. The pool stays active.
    ///
    /// Returns how many instances were disposed. A failing dispose hook does
    /// not stop the others; the first failure is returned once all ran.
    pub async fn flush(&self) -> Result<usize> {
        let idle: Vec<R> = {
            let mut inner = self.shared.inner.lock();
            inner
                .available
                .drain(..)
                .map(|slot| slot.instance)
                .collect()
        };
        self.dispose_instances(idle).await
    }

    /// Flush the pool, mark it disposed and remove it from the registry.
    ///
    /// Returns `true` if this call removed the pool from the registry, and
    /// `Ok(false)` if it was already disposed. Instances still checked out
    /// are dropped when they come back.
    pub async fn dispose(&self) -> Result<bool> {
        if self.is_disposed() {
            return Ok(false);
        }
        let target = self.shared.target();
        self.shared.hooks.run_before(HookEvent::Dispose, target)?;
        let Some(idle) = self.shared.retire(|_| true) else {
            return Ok(false);
        };
        let result = self.finish_dispose(idle).await;
        self.shared
            .hooks
            .run_after(HookEvent::Dispose, target, result.is_ok());
        result
    }

    /// Evict idle instances older than the scavenge interval.
    ///
    /// Evicted instances are disposed as a side effect. Returns `true` when
    /// the pool ends up holding nothing, which a pool with a reserved
    /// instance never does, disposed or not.
    pub async fn expired(&self) -> bool {
        let interval = self.shared.scavenge_interval;
        let stale: Vec<R> = {
            let mut inner = self.shared.inner.lock();
            if inner.state == PoolState::Disposed {
                return inner.reserved_count == 0;
            }
            let now = Instant::now();
            let (stale, fresh): (Vec<_>, Vec<_>) = inner
                .available
                .drain(..)
                .partition(|slot| now.duration_since(slot.last_used) > interval);
            inner.available = fresh;
            stale.into_iter().map(|slot| slot.instance).collect()
        };

        if !stale.is_empty() {
            tracing::debug!(
                resource = R::type_name(),
                pool_id = %self.shared.id,
                evicted = stale.len(),
                "evicting idle instances"
            );
            // Failures are logged per instance.
            let _ = self.dispose_instances(stale).await;
        }

        self.is_empty()
    }

    async fn dispose_instances(&self, instances: Vec<R>) -> Result<usize> {
        let count = instances.len();
        let mut first_error = None;
        for instance in instances {
            if let Err(err) = R::dispose(instance).await {
                tracing::warn!(
                    resource = R::type_name(),
                    pool_id = %self.shared.id,
                    error = %err,
                    "dispose hook failed"
                );
                first_error.get_or_insert(err);
            }
        }
        if count > 0 {
            self.shared.inner.lock().stats.disposed += count as u64;
        }
        first_error.map_or(Ok(count), Err)
    }

    async fn finish_dispose(&self, idle: Vec<R>) -> Result<bool> {
        let flushed = self.dispose_instances(idle).await;
        let removed = self
            .shared
            .registry
            .upgrade()
            .is_some_and(|registry| registry.unregister::<R>(&self.shared.args, self.shared.id));
        tracing::debug!(
            resource = R::type_name(),
            pool_id = %self.shared.id,
            args = ?self.shared.args,
            removed,
            "pool disposed"
        );
        flushed.map(|_| removed)
    }

    /// Reaper entry point: dispose the pool if `policy` says it is idle.
    async fn reap(&self, policy: ReapPolicy) -> Result<bool> {
        if self.is_disposed() || self.reserved_count() > 0 {
            return Ok(false);
        }
        if policy == ReapPolicy::Expired && !self.expired().await {
            return Ok(false);
        }

        let target = self.shared.target();
        self.shared.hooks.run_before(HookEvent::Dispose, target)?;
        // Re-checked under the lock: an acquire may have raced the checks
        // above, and under `Expired` a release may have left a fresh idle
        // instance behind.
        let Some(idle) = self.shared.retire(|inner| match policy {
            ReapPolicy::Idle => inner.reserved_count == 0,
            ReapPolicy::Expired => inner.size() == 0,
        }) else {
            return Ok(false);
        };
        let result = self.finish_dispose(idle).await;
        self.shared
            .hooks
            .run_after(HookEvent::Dispose, target, result.is_ok());
        result.map(|_| true)
    }
}

// ---------------------------------------------------------------------------
// Type-erased view used by the registry and the reaper
// ---------------------------------------------------------------------------

pub(crate) trait ErasedPool: Send + Sync {
    fn id(&self) -> PoolId;

    fn resource(&self) -> &'static str;

    fn reap_boxed(&self, policy: ReapPolicy) -> BoxFuture<'_, Result<bool>>;

    fn dispose_boxed(&self) -> BoxFuture<'_, Result<bool>>;
}

impl<R: Poolable> ErasedPool for Pool<R> {
    fn id(&self) -> PoolId {
        self.shared.id
    }

    fn resource(&self) -> &'static str {
        R::type_name()
    }

    fn reap_boxed(&self, policy: ReapPolicy) -> BoxFuture<'_, Result<bool>> {
        Box::pin(self.reap(policy))
    }

    fn dispose_boxed(&self) -> BoxFuture<'_, Result<bool>> {
        Box::pin(self.dispose())
    }
}

// ---------------------------------------------------------------------------
// Pooled<R>
// ---------------------------------------------------------------------------

/// A checked-out instance.
///
/// Derefs to the instance. Hand it back with [`Pool::release`]; dropping it
/// without releasing returns it to its pool as well.
pub struct Pooled<R: Poolable> {
    instance: Option<R>,
    owner: Arc<PoolShared<R>>,
    checked_out_at: Instant,
}

impl<R: Poolable> Pooled<R> {
    /// Id of the pool that owns this instance.
    #[must_use]
    pub fn pool_id(&self) -> PoolId {
        self.owner.id
    }

    /// When the instance was checked out.
    #[must_use]
    pub fn checked_out_at(&self) -> Instant {
        self.checked_out_at
    }

    fn take(&mut self) -> R {
        self.instance
            .take()
            .expect("pooled instance taken twice")
    }
}

impl<R: Poolable> Deref for Pooled<R> {
    type Target = R;

    fn deref(&self) -> &R {
        self.instance
            .as_ref()
            .expect("pooled instance used after release")
    }
}

impl<R: Poolable> DerefMut for Pooled<R> {
    fn deref_mut(&mut self) -> &mut R {
        self.instance
            .as_mut()
            .expect("pooled instance used after release")
    }
}

impl<R: Poolable> Drop for Pooled<R> {
    fn drop(&mut self) {
        if let Some(instance) = self.instance.take() {
            // A disposed owner drops the instance; nothing else to report.
            let _ = self.owner.check_in(instance);
        }
    }
}

impl<R: Poolable + fmt::Debug> fmt::Debug for Pooled<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pooled")
            .field("instance", &self.instance)
            .field("pool_id", &self.owner.id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Pooling;
    use std::sync::atomic::AtomicUsize;

    static CREATED: AtomicUsize = AtomicUsize::new(0);

    #[derive(Debug, PartialEq)]
    struct Widget {
        serial: usize,
    }

    impl Poolable for Widget {
        type Args = &'static str;

        async fn create(_args: &Self::Args) -> Result<Self> {
            Ok(Self {
                serial: CREATED.fetch_add(1, Ordering::SeqCst),
            })
        }

        fn pool_size() -> usize {
            2
        }
    }

    struct Unbounded;

    impl Poolable for Unbounded {
        type Args = ();

        async fn create(_args: &()) -> Result<Self> {
            Ok(Self)
        }

        fn pool_size() -> usize {
            0
        }
    }

    fn pooling() -> Pooling {
        Pooling::new(
            PoolingConfig::default()
                .with_scavenger_interval(Duration::from_secs(3600))
                .with_acquire_timeout(Some(Duration::from_millis(100))),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn zero_capacity_is_rejected() {
        let err = pooling().pool::<Unbounded>(()).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[tokio::test]
    async fn stale_owner_stamp_is_cross_pool() {
        let pool = pooling().pool::<Widget>("cross").unwrap();
        let foreign = PoolId::from_raw(u64::MAX);
        pool.shared.inner.lock().available.push(Slot {
            instance: Widget { serial: 999 },
            owner: Some(foreign),
            last_used: Instant::now(),
        });

        let err = pool.acquire().await.unwrap_err();
        assert!(matches!(
            err,
            Error::CrossPool { found, .. } if found == u64::MAX
        ));
        assert_eq!(pool.reserved_count(), 0);
        assert_eq!(pool.available_count(), 0);
        assert_eq!(pool.stats().disposed, 1, "foreign instance goes through dispose");
    }

    #[tokio::test]
    async fn check_in_stamps_the_idle_slot() {
        let pool = pooling().pool::<Widget>("stamp").unwrap();
        let item = pool.acquire().await.unwrap();
        pool.release(item).unwrap();

        let owners: Vec<_> = pool
            .shared
            .inner
            .lock()
            .available
            .iter()
            .map(|slot| slot.owner)
            .collect();
        assert_eq!(owners, vec![Some(pool.id())]);
    }

    #[tokio::test]
    async fn own_stamp_is_not_cross_pool() {
        let pool = pooling().pool::<Widget>("own").unwrap();
        let own = pool.id();
        pool.shared.inner.lock().available.push(Slot {
            instance: Widget { serial: 1000 },
            owner: Some(own),
            last_used: Instant::now(),
        });

        let item = pool.acquire().await.unwrap();
        assert_eq!(item.serial, 1000);
    }

    #[tokio::test]
    async fn debug_reports_counts() {
        let pool = pooling().pool::<Widget>("debug").unwrap();
        let _item = pool.acquire().await.unwrap();
        let rendered = format!("{pool:?}");
        assert!(rendered.contains("Widget"));
        assert!(rendered.contains("reserved_count: 1"));
        assert!(rendered.contains("available: 0"));
    }

    #[tokio::test]
    async fn dropped_reservation_frees_the_slot() {
        let pool = pooling().pool::<Widget>("reservation").unwrap();
        assert!(matches!(
            pool.shared.try_checkout().unwrap(),
            Checkout::Construct
        ));
        assert_eq!(pool.reserved_count(), 1);

        drop(Reservation {
            shared: &*pool.shared,
            armed: true,
        });
        assert_eq!(pool.reserved_count(), 0);
    }
}
