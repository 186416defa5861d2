//! Ownership stamping: orphaned releases, deletion and drop-return

use std::time::Duration;

use pooling::{Error, Poolable, Pooling, PoolingConfig, Result};

#[derive(Debug)]
struct Session {
    tenant: String,
}

impl Poolable for Session {
    type Args = String;

    async fn create(tenant: &String) -> Result<Self> {
        Ok(Self {
            tenant: tenant.clone(),
        })
    }

    fn pool_size() -> usize {
        2
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
async fn release_to_foreign_pool_is_orphaned() {
    let pooling = pooling();
    let acme = pooling.pool::<Session>("acme".into()).unwrap();
    let globex = pooling.pool::<Session>("globex".into()).unwrap();

    let session = acme.acquire().await.unwrap();
    assert_eq!(session.tenant, "acme");
    assert_eq!(session.pool_id(), acme.id());
    let _held = globex.acquire().await.unwrap();

    let before = globex.stats();
    let err = globex.release(session).unwrap_err();
    assert!(
        matches!(err, Error::OrphanedObject { pool, owner, .. }
            if pool == globex.id().as_u64() && owner == acme.id().as_u64()),
        "expected OrphanedObject, got: {err:?}"
    );

    assert_eq!(globex.stats(), before, "foreign pool counts must not change");
    assert_eq!(acme.reserved_count(), 0, "rejected instance goes back to its owner");
    assert_eq!(acme.available_count(), 1);
}

#[tokio::test]
async fn dropping_without_release_returns_to_pool() {
    let pooling = pooling();
    let pool = pooling.pool::<Session>("acme".into()).unwrap();

    {
        let _session = pool.acquire().await.unwrap();
        assert_eq!(pool.reserved_count(), 1);
    }

    assert_eq!(pool.reserved_count(), 0);
    assert_eq!(pool.available_count(), 1);
    assert_eq!(pool.stats().total_releases, 1);
}

#[tokio::test]
async fn delete_frees_the_slot_without_reuse() {
    let pooling = pooling();
    let pool = pooling.pool::<Session>("acme".into()).unwrap();

    let a = pool.acquire().await.unwrap();
    let _b = pool.acquire().await.unwrap();

    let detached = pool.delete(a).unwrap();
    assert_eq!(detached.tenant, "acme");
    assert_eq!(pool.size(), 1);
    assert_eq!(pool.available_count(), 0, "deleted instance is not pooled again");

    let _c = pool.acquire().await.expect("freed slot should allow a new instance");
    assert_eq!(pool.stats().created, 3);
}

#[tokio::test]
async fn delete_from_foreign_pool_is_orphaned() {
    let pooling = pooling();
    let acme = pooling.pool::<Session>("acme".into()).unwrap();
    let globex = pooling.pool::<Session>("globex".into()).unwrap();

    let session = acme.acquire().await.unwrap();
    let err = globex.delete(session).unwrap_err();
    assert!(matches!(err, Error::OrphanedObject { .. }));
    assert_eq!(acme.available_count(), 1);
}

#[tokio::test]
async fn deref_mut_reaches_the_instance() {
    let pooling = pooling();
    let pool = pooling.pool::<Session>("acme".into()).unwrap();

    let mut session = pool.acquire().await.unwrap();
    session.tenant.push_str("-eu");
    pool.release(session).unwrap();

    let session = pool.acquire().await.unwrap();
    assert_eq!(session.tenant, "acme-eu", "state survives a release/acquire cycle");
}
