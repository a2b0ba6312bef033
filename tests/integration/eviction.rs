use crate::*;

use std::time::Duration;

/// Deterministic aging: forced sweeps advance the shard clock tick by tick,
/// and a session dies on the first tick past its budget.
#[tokio::test]
async fn session_expires_after_its_tick_budget() {
    let runtime = runtime(1, 8);
    let router = runtime.router();

    let (owner, handle) = AppSession::shared();
    let id = router
        .create_with_timeout(0, Some(handle), 0, 2, "app")
        .await
        .unwrap();

    for tick in 1..=2u64 {
        let report = router.sweep(0).await.unwrap();
        assert_eq!(report.tick, tick);
        assert_eq!(report.evicted, 0, "alive through tick {tick}");
    }

    let report = router.sweep(0).await.unwrap();
    assert_eq!(report.evicted, 1);
    assert!(router.lookup(id).await.unwrap().is_none());
    assert_eq!(owner.destroyed_count(), 1);
    assert_eq!(runtime.registry().active_total(), 0);
}

/// Lookups are what keep a session alive: traffic resets the inactivity
/// clock, silence lets it run out.
#[tokio::test]
async fn activity_defers_eviction() {
    let runtime = runtime(1, 8);
    let router = runtime.router();

    let chatty = router.create_with_timeout(0, None, 0, 2, "app").await.unwrap();
    let silent = router.create_with_timeout(0, None, 0, 2, "app").await.unwrap();

    for _ in 0..4 {
        router.sweep(0).await.unwrap();
        assert!(router.lookup(chatty).await.unwrap().is_some());
    }

    assert!(router.lookup(silent).await.unwrap().is_none(), "evicted");
    assert!(router.lookup(chatty).await.unwrap().is_some(), "kept warm");
}

/// An expired session whose owner is mid-use survives the sweep and falls on
/// a later tick once the owner goes idle.
#[tokio::test]
async fn busy_owner_defers_eviction_without_losing_it() {
    let runtime = runtime(1, 8);
    let router = runtime.router();

    let (owner, handle) = AppSession::shared();
    let id = router
        .create_with_timeout(0, Some(handle), 0, 0, "app")
        .await
        .unwrap();

    owner.set_busy(true);
    let report = router.sweep(0).await.unwrap();
    assert_eq!(report.evicted, 0);
    assert_eq!(report.skipped_busy, 1);
    assert!(router.lookup(id).await.unwrap().is_some());

    owner.set_busy(false);
    // The lookup above refreshed liveness; age past the zero budget again.
    let report = router.sweep(0).await.unwrap();
    assert_eq!(report.evicted, 1);
    assert_eq!(owner.destroyed_count(), 1);
}

/// The timed sweep runs without any forced commands: with a one-second
/// cadence and a zero-tick budget, an idle session disappears on its own.
#[tokio::test]
async fn timed_sweep_evicts_idle_sessions() {
    let runtime = runtime_with_sweep(1, 8, 1);
    let router = runtime.router();

    let id = router.create_with_timeout(0, None, 0, 0, "app").await.unwrap();

    let mut evicted = false;
    for _ in 0..40 {
        tokio::time::sleep(Duration::from_millis(250)).await;
        if router.lookup(id).await.unwrap().is_none() {
            evicted = true;
            break;
        }
    }
    assert!(evicted, "timed sweep should have evicted the idle session");
}

/// Sweeps on one shard never age or evict sessions on another.
#[tokio::test]
async fn sweeps_are_shard_local() {
    let runtime = runtime(2, 8);
    let router = runtime.router();

    let on_zero = router.create_with_timeout(0, None, 0, 1, "app").await.unwrap();
    let on_one = router.create_with_timeout(1, None, 0, 1, "app").await.unwrap();

    for _ in 0..3 {
        router.sweep(0).await.unwrap();
    }

    assert!(router.lookup(on_zero).await.unwrap().is_none());
    assert!(router.lookup(on_one).await.unwrap().is_some());
    assert_eq!(runtime.registry().active_counts(), vec![0, 1]);
}
