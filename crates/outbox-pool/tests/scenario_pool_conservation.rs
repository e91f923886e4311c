//! Scenario: pool conservation.
//!
//! For any sequence of get/release, once every get has a matching release
//! the pool holds nothing for that key and the factory's release callback
//! ran exactly once.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use outbox_pool::{PoolError, SharedPool};

fn counting_factory(
    created: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
) -> impl FnOnce() -> outbox_pool::BoxFuture<'static, Result<(u64, outbox_pool::ReleaseFn), PoolError>>
{
    move || {
        Box::pin(async move {
            created.fetch_add(1, Ordering::SeqCst);
            let released = released.clone();
            let release: outbox_pool::ReleaseFn = Box::new(move || {
                Box::pin(async move {
                    released.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
            });
            Ok((42u64, release))
        })
    }
}

#[tokio::test]
async fn nested_gets_share_one_value_and_release_exactly_once() {
    let pool: Arc<SharedPool<&'static str, u64>> = Arc::new(SharedPool::new());
    let created = Arc::new(AtomicUsize::new(0));
    let released = Arc::new(AtomicUsize::new(0));

    let h1 = pool
        .get("conn", counting_factory(created.clone(), released.clone()))
        .await
        .unwrap();
    assert_eq!(*h1.value().as_ref(), 42);

    let h2 = pool
        .get("conn", counting_factory(created.clone(), released.clone()))
        .await
        .unwrap();

    // Second get must not invoke the factory again.
    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert_eq!(pool.live_keys().await, 1);

    h1.release().await.unwrap();
    assert_eq!(released.load(Ordering::SeqCst), 0, "must not release while a holder remains");
    assert_eq!(pool.live_keys().await, 1);

    h2.release().await.unwrap();
    assert_eq!(released.load(Ordering::SeqCst), 1, "must release exactly once on last holder");
    assert_eq!(pool.live_keys().await, 0);
}

#[tokio::test]
async fn distinct_keys_get_distinct_values() {
    let pool: Arc<SharedPool<u32, u64>> = Arc::new(SharedPool::new());
    let created = Arc::new(AtomicUsize::new(0));
    let released = Arc::new(AtomicUsize::new(0));

    let a = pool
        .get(1, counting_factory(created.clone(), released.clone()))
        .await
        .unwrap();
    let b = pool
        .get(2, counting_factory(created.clone(), released.clone()))
        .await
        .unwrap();

    assert_eq!(created.load(Ordering::SeqCst), 2);
    a.release().await.unwrap();
    b.release().await.unwrap();
    assert_eq!(released.load(Ordering::SeqCst), 2);
    assert_eq!(pool.live_keys().await, 0);
}

#[tokio::test]
async fn get_after_full_release_runs_factory_again() {
    let pool: Arc<SharedPool<&'static str, u64>> = Arc::new(SharedPool::new());
    let created = Arc::new(AtomicUsize::new(0));
    let released = Arc::new(AtomicUsize::new(0));

    let h1 = pool
        .get("conn", counting_factory(created.clone(), released.clone()))
        .await
        .unwrap();
    h1.release().await.unwrap();

    let h2 = pool
        .get("conn", counting_factory(created.clone(), released.clone()))
        .await
        .unwrap();
    assert_eq!(created.load(Ordering::SeqCst), 2);
    h2.release().await.unwrap();
    assert_eq!(released.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn factory_error_installs_nothing() {
    let pool: Arc<SharedPool<&'static str, u64>> = Arc::new(SharedPool::new());

    #[derive(Debug, thiserror::Error)]
    #[error("boom")]
    struct Boom;

    let result = pool
        .get("conn", || {
            Box::pin(async move { Err::<(u64, outbox_pool::ReleaseFn), _>(PoolError::factory(Boom)) })
                as outbox_pool::BoxFuture<'static, Result<(u64, outbox_pool::ReleaseFn), PoolError>>
        })
        .await;

    assert!(result.is_err());
    assert_eq!(pool.live_keys().await, 0);
}
