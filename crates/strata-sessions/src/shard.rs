//! Shard affinity tracking.
//!
//! Each shard is one cooperative, single-writer execution context. Pool
//! mutations are only legal from the thread currently driving that shard, so
//! every registry entry point checks the caller's shard before touching pool
//! state. The current shard is a thread-local set by an RAII scope guard —
//! the shard worker enters its scope once at startup and holds it for the
//! thread's lifetime.

use std::cell::Cell;

thread_local! {
    static CURRENT_SHARD: Cell<Option<u8>> = const { Cell::new(None) };
}

/// The shard this thread is currently executing for, if any.
pub fn current() -> Option<u8> {
    CURRENT_SHARD.with(Cell::get)
}

/// RAII guard marking this thread as the execution context of one shard.
///
/// Scopes nest; dropping a guard restores whatever was current before it.
#[must_use = "affinity lasts only while the scope guard is alive"]
pub struct ShardScope {
    previous: Option<u8>,
}

impl ShardScope {
    pub fn enter(shard_id: u8) -> Self {
        let previous = CURRENT_SHARD.with(|c| c.replace(Some(shard_id)));
        Self { previous }
    }
}

impl Drop for ShardScope {
    fn drop(&mut self) {
        CURRENT_SHARD.with(|c| c.set(self.previous));
    }
}
