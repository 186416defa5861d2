//! The trait a type implements to be pooled.
//!
//! A resource type supplies its un-pooled constructor plus the hooks the pool
//! needs: capacity, idle-scavenge interval and disposal.

use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::time::Duration;

use crate::error::Result;

/// Capacity used when a resource type does not override [`Poolable::pool_size`].
pub const DEFAULT_POOL_SIZE: usize = 8;

/// Idle age used when a resource type does not override
/// [`Poolable::scavenge_interval`].
pub const DEFAULT_SCAVENGE_INTERVAL: Duration = Duration::from_secs(60);

/// A type whose instances can be kept in a [`Pool`](crate::Pool).
///
/// One pool exists per distinct `Args` value; instances built from different
/// arguments are never mixed.
pub trait Poolable: Sized + Send + 'static {
    /// Construction arguments. Together with the type they form the pool key.
    type Args: Clone + Eq + Hash + Debug + Send + Sync + 'static;

    /// Build a fresh instance. Called only when no idle instance is available
    /// and the pool is below capacity.
    fn create(args: &Self::Args) -> impl Future<Output = Result<Self>> + Send;

    /// Maximum number of instances (idle plus reserved) per pool. Must be at
    /// least 1.
    fn pool_size() -> usize {
        DEFAULT_POOL_SIZE
    }

    /// How long an instance may sit idle before `expired` evicts it. Must be
    /// at least one second.
    fn scavenge_interval() -> Duration {
        DEFAULT_SCAVENGE_INTERVAL
    }

    /// Release whatever the instance holds. Called once per idle instance
    /// when it is evicted or its pool is flushed.
    fn dispose(self) -> impl Future<Output = Result<()>> + Send {
        async move {
            drop(self);
            Ok(())
        }
    }

    /// Name used in logs and errors.
    fn type_name() -> &'static str {
        std::any::type_name::<Self>()
    }
}
