//! Flushing, disposing and expiring pools.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use pooling::{Error, PoolState, Poolable, Pooling, PoolingConfig, Result};

static SERIAL: AtomicU64 = AtomicU64::new(0);
static DISPOSED: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug)]
struct Buffer {
    key: String,
    serial: u64,
}

impl Poolable for Buffer {
    type Args = String;

    async fn create(key: &String) -> Result<Self> {
        Ok(Self {
            key: key.clone(),
            serial: SERIAL.fetch_add(1, Ordering::SeqCst),
        })
    }

    fn pool_size() -> usize {
        2
    }

    async fn dispose(self) -> Result<()> {
        match self.key.as_str() {
            "flushed" => {
                DISPOSED.fetch_add(1, Ordering::SeqCst);
            }
            "fragile" => {
                return Err(Error::dispose("Buffer", format!("buffer {} is pinned", self.serial)));
            }
            _ => {}
        }
        Ok(())
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

async fn fill(pool: &pooling::Pool<Buffer>) {
    let a = pool.acquire().await.unwrap();
    let b = pool.acquire().await.unwrap();
    pool.release(a).unwrap();
    pool.release(b).unwrap();
}

#[tokio::test]
async fn flush_disposes_idle_instances_and_keeps_pool_active() {
    let pooling = pooling();
    let pool = pooling.pool::<Buffer>("flushed".into()).unwrap();
    fill(&pool).await;
    let held = pool.acquire().await.unwrap();

    assert_eq!(pool.flush().await.unwrap(), 1);

    assert_eq!(DISPOSED.load(Ordering::SeqCst), 1);
    assert_eq!(pool.state(), PoolState::Active);
    assert_eq!(pool.available_count(), 0);
    assert_eq!(pool.reserved_count(), 1);
    assert_eq!(pool.stats().disposed, 1);

    pool.release(held).unwrap();
    assert_eq!(pool.available_count(), 1);
    assert!(pooling.contains::<Buffer>(&"flushed".to_string()));
}

#[tokio::test]
async fn failing_dispose_hook_still_disposes_every_instance() {
    let pooling = pooling();
    let pool = pooling.pool::<Buffer>("fragile".into()).unwrap();
    fill(&pool).await;

    let err = pool.flush().await.unwrap_err();
    assert!(matches!(err, Error::Dispose { .. }));
    assert_eq!(pool.available_count(), 0);
    assert_eq!(pool.stats().disposed, 2);
}

#[tokio::test]
async fn dispose_unregisters_the_pool() {
    let pooling = pooling();
    let key = "disposable".to_string();
    let pool = pooling.pool::<Buffer>(key.clone()).unwrap();
    fill(&pool).await;

    assert!(pool.dispose().await.unwrap());
    assert!(pool.is_disposed());
    assert!(!pooling.contains::<Buffer>(&key));
    assert_eq!(pooling.pool_count(), 0);
    assert_eq!(pool.stats().disposed, 2);

    // Second dispose is a no-op.
    assert!(!pool.dispose().await.unwrap());

    // The stale handle refuses work; the registry hands out a fresh pool.
    let err = pool.acquire().await.unwrap_err();
    assert!(matches!(err, Error::Disposed { .. }));
    let item = pooling.acquire::<Buffer>(key.clone()).await.unwrap();
    assert_ne!(item.pool_id(), pool.id());
}

#[tokio::test]
async fn waiting_acquirer_sees_disposal() {
    let pooling = pooling();
    let pool = pooling.pool::<Buffer>("contended".into()).unwrap();
    let _a = pool.acquire().await.unwrap();
    let _b = pool.acquire().await.unwrap();

    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.acquire_timeout(None).await.map(|_| ()) })
    };
    tokio::task::yield_now().await;

    assert!(pool.dispose().await.unwrap());

    let result = tokio::time::timeout(Duration::from_secs(5), waiter)
        .await
        .expect("waiter should be woken by dispose")
        .unwrap();
    assert!(matches!(result, Err(Error::Disposed { .. })));
}

#[tokio::test]
async fn release_into_disposed_pool_drops_the_instance() {
    let pooling = pooling();
    let pool = pooling.pool::<Buffer>("closing".into()).unwrap();
    let held = pool.acquire().await.unwrap();

    assert!(pool.dispose().await.unwrap());

    let err = pool.release(held).unwrap_err();
    assert!(matches!(err, Error::Disposed { .. }));
    assert_eq!(pool.size(), 0);
    assert_eq!(pool.stats().total_releases, 1);
}

#[tokio::test(start_paused = true)]
async fn expired_evicts_only_stale_idle_instances() {
    let pooling = pooling();
    let pool = pooling.pool::<Buffer>("ageing".into()).unwrap();
    fill(&pool).await;

    assert!(!pool.expired().await);
    assert_eq!(pool.available_count(), 2);

    tokio::time::advance(Duration::from_secs(61)).await;

    assert!(pool.expired().await);
    assert_eq!(pool.available_count(), 0);
    assert_eq!(pool.stats().disposed, 2);
    // Expiring evicts instances but does not dispose the pool.
    assert_eq!(pool.state(), PoolState::Active);
}

#[tokio::test(start_paused = true)]
async fn pool_with_reserved_instance_never_expires() {
    let pooling = pooling();
    let pool = pooling.pool::<Buffer>("partial".into()).unwrap();
    let held = pool.acquire().await.unwrap();
    let idle = pool.acquire().await.unwrap();
    pool.release(idle).unwrap();

    tokio::time::advance(Duration::from_secs(61)).await;

    assert!(!pool.expired().await);
    assert_eq!(pool.available_count(), 0);
    assert_eq!(pool.reserved_count(), 1);
    assert_eq!(pool.stats().disposed, 1);
    drop(held);
}

#[tokio::test]
async fn disposed_pool_expires_once_nothing_is_reserved() {
    let pooling = pooling();
    let pool = pooling.pool::<Buffer>("gone".into()).unwrap();
    let held = pool.acquire().await.unwrap();
    pool.dispose().await.unwrap();

    assert_eq!(pool.reserved_count(), 1);
    assert!(!pool.expired().await, "a reserved instance keeps the pool from expiring");

    drop(held);
    assert_eq!(pool.reserved_count(), 0);
    assert!(pool.expired().await);
}

#[tokio::test]
async fn shutdown_disposes_every_pool() {
    let pooling = pooling();
    let first = pooling.pool::<Buffer>("shutdown-a".into()).unwrap();
    let second = pooling.pool::<Buffer>("shutdown-b".into()).unwrap();
    fill(&first).await;
    fill(&second).await;

    pooling.shutdown().await.unwrap();

    assert!(first.is_disposed());
    assert!(second.is_disposed());
    assert_eq!(first.stats().disposed + second.stats().disposed, 4);
    assert_eq!(pooling.pool_count(), 0);
    assert!(pooling.is_shut_down());

    let err = pooling
        .acquire::<Buffer>("shutdown-a".into())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Disposed { .. }));
}
