use crate::*;

use strata_sessions::pool::PoolExhausted;
use strata_sessions::registry::RegistryError;
use stratad::RouterError;

/// A full pool refuses creation with a typed error instead of degrading.
#[tokio::test]
async fn full_pool_reports_exhaustion() {
    let runtime = runtime(1, 2);
    let router = runtime.router();

    let first = router.create(0, None, 0, "app").await.unwrap();
    let second = router.create(0, None, 0, "app").await.unwrap();
    assert_ne!(first.slot_index, second.slot_index);

    let err = router.create(0, None, 0, "app").await.unwrap_err();
    assert!(matches!(
        err,
        RouterError::Registry(RegistryError::PoolExhausted(PoolExhausted { shard_id: 0 }))
    ));

    // Existing sessions are untouched by the failed create.
    assert!(router.lookup(first).await.unwrap().is_some());
    assert!(router.lookup(second).await.unwrap().is_some());
}

/// Freeing one slot unblocks creation; the freed index comes back under a
/// new salt, and the old token stays dead.
#[tokio::test]
async fn destroyed_slot_is_reused_with_fresh_salt() {
    let runtime = runtime(1, 2);
    let router = runtime.router();

    let first = router.create(0, None, 0, "app").await.unwrap();
    let _second = router.create(0, None, 0, "app").await.unwrap();
    assert!(router.create(0, None, 0, "app").await.is_err());

    assert!(router.destroy(first).await.unwrap());
    let fourth = router.create(0, None, 0, "app").await.unwrap();

    assert_eq!(fourth.slot_index, first.slot_index);
    assert_ne!(fourth.salt, first.salt);

    // The recycled slot is unreachable through the old identity.
    assert!(router.lookup(first).await.unwrap().is_none());
    assert!(!router.destroy(first).await.unwrap());
    assert!(router.lookup(fourth).await.unwrap().is_some());
}

/// Eviction frees capacity just like explicit destruction.
#[tokio::test]
async fn sweep_relieves_exhaustion() {
    let runtime = runtime(1, 2);
    let router = runtime.router();

    router.create_with_timeout(0, None, 0, 0, "app").await.unwrap();
    router.create_with_timeout(0, None, 0, 0, "app").await.unwrap();
    assert!(router.create(0, None, 0, "app").await.is_err());

    let report = router.sweep(0).await.unwrap();
    assert_eq!(report.evicted, 2);

    assert!(router.create(0, None, 0, "app").await.is_ok());
    assert_eq!(runtime.registry().active_total(), 1);
}

/// Shards exhaust independently: one full pool does not affect another.
#[tokio::test]
async fn exhaustion_is_per_shard() {
    let runtime = runtime(2, 1);
    let router = runtime.router();

    router.create(0, None, 0, "app").await.unwrap();
    assert!(router.create(0, None, 0, "app").await.is_err());

    // Shard 1 still has its slot.
    assert!(router.create(1, None, 0, "app").await.is_ok());
}
