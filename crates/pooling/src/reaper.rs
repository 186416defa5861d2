//! Idle sweep that disposes pools nobody is using.
//!
//! One reaper task runs per [`Pooling`](crate::Pooling), started with its
//! first pool. Each pass snapshots the registered pools, then checks them one
//! at a time; a failure or panic in one pool is logged and the pass moves on.
//!
//! Tokio tasks carry no scheduling priority, so unlike a low-priority thread
//! the reaper competes with other tasks on equal terms. Each pass is short.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Weak;
use std::time::Duration;

use futures::FutureExt;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::registry::Shared;

/// Outcome of one reaper pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Pools looked at.
    pub inspected: usize,
    /// Pools disposed and removed from the registry.
    pub disposed: usize,
    /// Pools whose check or disposal returned an error or panicked.
    pub failed: usize,
}

pub(crate) async fn sweep(shared: &Shared) -> SweepReport {
    let pools = shared.snapshot();
    let policy = shared.config.reap_policy;
    let mut report = SweepReport {
        inspected: pools.len(),
        ..SweepReport::default()
    };

    for pool in pools {
        match AssertUnwindSafe(pool.reap_boxed(policy)).catch_unwind().await {
            Ok(Ok(true)) => report.disposed += 1,
            Ok(Ok(false)) => {}
            Ok(Err(Error::Cancelled { hook, reason })) => {
                tracing::debug!(
                    resource = pool.resource(),
                    pool_id = %pool.id(),
                    %hook,
                    %reason,
                    "hook kept pool alive"
                );
            }
            Ok(Err(err)) => {
                report.failed += 1;
                tracing::error!(
                    resource = pool.resource(),
                    pool_id = %pool.id(),
                    error = %err,
                    "reaper failed to dispose pool"
                );
            }
            Err(panic) => {
                report.failed += 1;
                tracing::error!(
                    resource = pool.resource(),
                    pool_id = %pool.id(),
                    panic = panic_message(&*panic),
                    "reaper check panicked"
                );
            }
        }
    }

    report
}

/// The reaper loop. Ends when `shutdown` fires or the registry is dropped.
pub(crate) async fn run(shared: Weak<Shared>, shutdown: CancellationToken, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; the first sweep waits a full interval.
    ticker.tick().await;

    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(shared) = shared.upgrade() else {
            break;
        };
        let report = sweep(&shared).await;
        drop(shared);

        if report.disposed > 0 || report.failed > 0 {
            tracing::debug!(
                inspected = report.inspected,
                disposed = report.disposed,
                failed = report.failed,
                "reaper sweep finished"
            );
        }
    }

    tracing::debug!("pool reaper stopped");
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}
