//! Strata integration test harness.
//!
//! Tests here drive the full shard runtime: real worker threads, commands
//! routed across thread boundaries, sweeps both timed and forced. Each test
//! builds its own runtime with its own dimensions — there is no shared
//! state between tests.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use strata_core::config::StrataConfig;
use strata_sessions::{OwnerHandle, SessionOwner};
use stratad::ShardRuntime;

mod eviction;
mod exhaustion;
mod sessions;

// ── Harness ───────────────────────────────────────────────────────────────────

/// Build a runtime whose timed sweep is effectively disabled; tests that
/// want eviction either force sweeps or use [`runtime_with_sweep`].
pub fn runtime(shards: u8, slots: u32) -> ShardRuntime {
    runtime_with_sweep(shards, slots, 3_600)
}

pub fn runtime_with_sweep(shards: u8, slots: u32, sweep_interval_secs: u64) -> ShardRuntime {
    let mut config = StrataConfig::default();
    config.shards.count = shards;
    config.sessions.max_slots_per_shard = slots;
    config.sessions.default_timeout_ticks = 10;
    config.sessions.sweep_interval_secs = sweep_interval_secs;
    ShardRuntime::start(&config).expect("runtime should start")
}

/// Application-side session payload double, implementing the owner contract.
#[derive(Default)]
pub struct AppSession {
    busy: AtomicBool,
    destroyed: AtomicU32,
}

impl AppSession {
    pub fn shared() -> (Arc<AppSession>, OwnerHandle) {
        let owner = Arc::new(AppSession::default());
        let handle: OwnerHandle = Arc::downgrade(&(owner.clone() as Arc<dyn SessionOwner>));
        (owner, handle)
    }

    pub fn set_busy(&self, busy: bool) {
        self.busy.store(busy, Ordering::SeqCst);
    }

    pub fn destroyed_count(&self) -> u32 {
        self.destroyed.load(Ordering::SeqCst)
    }
}

impl SessionOwner for AppSession {
    fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    fn mark_busy(&self) {
        self.busy.store(true, Ordering::SeqCst);
    }

    fn mark_idle(&self) {
        self.busy.store(false, Ordering::SeqCst);
    }

    fn on_destroyed(&self) {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}
