//! Registry-wide pooling configuration

use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How the reaper decides that an idle pool can be disposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ReapPolicy {
    /// Dispose any pool with no reserved instances.
    Idle,
    /// Dispose a pool only once it has no reserved instances and every idle
    /// instance has outlived the resource's scavenge interval.
    #[default]
    Expired,
}

/// Configuration shared by every pool of a [`Pooling`](crate::Pooling).
///
/// Per-type settings (capacity, scavenge interval, dispose hook) live on
/// [`Poolable`](crate::Poolable) instead.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PoolingConfig {
    /// How often the reaper sweeps registered pools
    pub scavenger_interval: Duration,
    /// Default deadline for `acquire`; `None` waits until capacity frees up
    pub acquire_timeout: Option<Duration>,
    /// Longest a waiting acquirer parks before re-checking the pool
    pub retry_interval: Duration,
    /// Which pools a sweep disposes
    pub reap_policy: ReapPolicy,
}

impl Default for PoolingConfig {
    fn default() -> Self {
        Self {
            scavenger_interval: Duration::from_secs(60),
            acquire_timeout: Some(Duration::from_secs(30)),
            retry_interval: Duration::from_millis(50),
            reap_policy: ReapPolicy::default(),
        }
    }
}

impl PoolingConfig {
    /// Set the reaper sweep interval.
    pub fn with_scavenger_interval(mut self, interval: Duration) -> Self {
        self.scavenger_interval = interval;
        self
    }

    /// Set the default acquire deadline.
    pub fn with_acquire_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Set the waiter re-check interval.
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Set the reap policy.
    pub fn with_reap_policy(mut self, policy: ReapPolicy) -> Self {
        self.reap_policy = policy;
        self
    }

    /// Validate the configuration, returning an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.scavenger_interval.is_zero() {
            return Err(Error::configuration(
                "scavenger_interval must be greater than zero",
            ));
        }
        if self.retry_interval.is_zero() {
            return Err(Error::configuration(
                "retry_interval must be greater than zero",
            ));
        }
        if self.acquire_timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::configuration(
                "acquire_timeout must be greater than zero when set",
            ));
        }
        Ok(())
    }
}
