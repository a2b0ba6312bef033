use crate::*;

use strata_core::SessionIdentity;
use strata_sessions::registry::RegistryError;
use strata_sessions::ShardScope;

/// The whole client lifecycle, as a front end would drive it: create, carry
/// the ASCII token around, resolve it, destroy it.
#[tokio::test]
async fn token_lifecycle_across_the_wire() {
    let runtime = runtime(2, 16);
    let router = runtime.router();

    let id = router.create(1, None, 3, "webapp").await.unwrap();

    // The cookie value a client would hold.
    let token = id.encode_ascii();
    assert!(strata_core::identity::is_token(&token));

    // Resolving the token finds the session and refreshes its liveness.
    let handle = router
        .resolve_token(&token)
        .await
        .unwrap()
        .expect("token should resolve");
    assert_eq!(handle.identity.slot_index, id.slot_index);
    assert_eq!(&*handle.owner_tag, "webapp");

    // The binary IPC form addresses the same session.
    let (lower, upper) = id.to_words();
    let from_ipc = SessionIdentity::from_words(lower, upper);
    assert!(router.lookup(from_ipc).await.unwrap().is_some());

    assert!(router.destroy(id).await.unwrap());
    assert!(router.resolve_token(&token).await.unwrap().is_none());
}

/// A token with the right slot address but a guessed salt is dead on
/// arrival, end to end.
#[tokio::test]
async fn guessed_salt_never_resolves() {
    let runtime = runtime(1, 4);
    let router = runtime.router();

    let id = router.create(0, None, 0, "app").await.unwrap();
    let forged = SessionIdentity::new(id.shard_id, id.slot_index, id.salt ^ 0xFF, id.routing_id);

    assert!(router.lookup(forged).await.unwrap().is_none());
    assert!(!router.destroy(forged).await.unwrap());

    // The real session is untouched.
    assert!(router.lookup(id).await.unwrap().is_some());
}

/// Concurrent clients on every shard, from threads with no shard affinity.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_traffic_across_shards() {
    let runtime = runtime(4, 256);
    let router = runtime.router();

    let tasks: Vec<_> = (0..4u8)
        .map(|shard_id| {
            let router = router.clone();
            tokio::spawn(async move {
                let mut live = Vec::new();
                for round in 0..100usize {
                    let id = router
                        .create(shard_id, None, 0, "load")
                        .await
                        .expect("pool has headroom");
                    live.push(id);
                    if round % 2 == 0 {
                        let id = live.remove(0);
                        assert!(router.destroy(id).await.unwrap());
                    }
                }
                for id in &live {
                    assert!(router.lookup(*id).await.unwrap().is_some());
                }
                live.len() as u32
            })
        })
        .collect();

    let mut expected = Vec::new();
    for task in tasks {
        expected.push(task.await.unwrap());
    }
    assert_eq!(runtime.registry().active_counts(), expected);
}

/// Busy/idle gating: an exclusive-access lookup is withheld while the owner
/// is in use, while plain validation still succeeds.
#[tokio::test]
async fn exclusive_lookup_respects_busy_owner() {
    let runtime = runtime(1, 4);
    let router = runtime.router();

    let (owner, handle) = AppSession::shared();
    let id = router.create(0, Some(handle), 0, "app").await.unwrap();

    owner.set_busy(true);
    assert!(router.lookup_idle(id).await.unwrap().is_none());
    assert!(router.lookup(id).await.unwrap().is_some());

    owner.set_busy(false);
    assert!(router.lookup_idle(id).await.unwrap().is_some());
}

/// Touching the registry directly from a foreign context is refused — the
/// router and its workers are the only sanctioned path in the daemon.
#[tokio::test]
async fn direct_registry_access_requires_affinity() {
    let runtime = runtime(2, 4);
    let router = runtime.router();

    let id = router.create(0, None, 0, "app").await.unwrap();

    // This test thread never entered a shard scope.
    let registry = runtime.registry();
    assert!(matches!(
        registry.lookup(&id),
        Err(RegistryError::CrossShardAccessDenied {
            target: 0,
            current: None
        })
    ));

    // Even with a scope, only the matching shard passes.
    let _scope = ShardScope::enter(1);
    assert!(matches!(
        registry.destroy(&id),
        Err(RegistryError::CrossShardAccessDenied {
            target: 0,
            current: Some(1)
        })
    ));

    // The affinity-free stats surface still works from here.
    assert_eq!(registry.active_total(), 1);
}
