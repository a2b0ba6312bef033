//! The global session registry.
//!
//! Owns one [`ShardSessionPool`] per shard and routes every operation by the
//! shard id embedded in the identity. There is no lock around pool state:
//! correctness rests on the external single-writer invariant — all mutating
//! calls for a shard arrive from that shard's own execution context. The
//! registry enforces the reachable half of that invariant dynamically: any
//! call whose target shard is not the calling thread's current shard fails
//! with [`RegistryError::CrossShardAccessDenied`] instead of touching foreign
//! memory.
//!
//! Per-shard live-session counts are mirrored into atomics so status surfaces
//! can read them from any thread without shard affinity.

use std::cell::RefCell;
use std::sync::atomic::{AtomicU32, Ordering};

use strata_core::{DecodeError, SaltRng, SessionIdentity};

use crate::owner::OwnerHandle;
use crate::pool::{PoolExhausted, SessionHandle, ShardSessionPool, SweepReport};
use crate::shard;

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// No free slot on the target shard. Surfaced to the caller as a
    /// request-level failure; an in-use slot is never overwritten.
    #[error(transparent)]
    PoolExhausted(#[from] PoolExhausted),

    /// Operation attempted from a context not affine to the target shard.
    /// A programming/integration error — fatal to the calling operation,
    /// never to the process.
    #[error("shard {target} accessed from context {current:?}")]
    CrossShardAccessDenied { target: u8, current: Option<u8> },

    /// An ASCII token failed to decode. Equivalent to "invalid or absent
    /// session" at the request level.
    #[error(transparent)]
    MalformedToken(#[from] DecodeError),
}

// ── Registry ──────────────────────────────────────────────────────────────────

/// One pool per shard, single-writer each.
///
/// The cell is only ever borrowed after the affinity check proves the calling
/// thread has entered this shard's scope, and each shard has exactly one
/// execution context driving it. The `RefCell` turns any violation that
/// slips past the check — a re-entrant owner callback, two scopes for one
/// shard — into a loud panic instead of silent corruption.
struct ShardCell(RefCell<ShardSessionPool>);

// SAFETY: cross-thread access is gated by the shard-affinity check; only the
// single thread currently holding a shard's scope reaches its RefCell. The
// external single-writer invariant (one context per shard) is documented in
// the crate root and upheld by the shard runtime.
unsafe impl Sync for ShardCell {}

/// The per-process session registry: the only entry points external
/// collaborators use.
pub struct SessionRegistry {
    shards: Box<[ShardCell]>,
    active: Box<[AtomicU32]>,
}

impl SessionRegistry {
    /// Build a registry with `num_shards` pools of `slots_per_shard` slots.
    ///
    /// Each pool gets its own salt RNG seeded from OS entropy, so salt
    /// generation never serializes shards against each other.
    pub fn new(num_shards: u8, slots_per_shard: u32) -> Self {
        let shards = (0..num_shards)
            .map(|shard_id| {
                ShardCell(RefCell::new(ShardSessionPool::new(
                    shard_id,
                    slots_per_shard,
                    SaltRng::from_entropy(),
                )))
            })
            .collect();
        let active = (0..num_shards).map(|_| AtomicU32::new(0)).collect();
        Self { shards, active }
    }

    pub fn num_shards(&self) -> u8 {
        self.shards.len() as u8
    }

    // ── Operations ───────────────────────────────────────────────────────────

    /// Create a session on `shard_id`. The caller must already be executing
    /// on that shard.
    pub fn create(
        &self,
        shard_id: u8,
        owner: Option<OwnerHandle>,
        routing_id: u8,
        timeout_ticks: u64,
        owner_tag: impl Into<std::sync::Arc<str>>,
    ) -> Result<SessionIdentity, RegistryError> {
        let identity = {
            let mut pool = self.pool_mut(shard_id)?;
            pool.create(owner, routing_id, timeout_ticks, owner_tag)?
        };
        self.active[shard_id as usize].fetch_add(1, Ordering::Relaxed);
        Ok(identity)
    }

    /// Salt-validated lookup; touches liveness on success.
    pub fn lookup(
        &self,
        identity: &SessionIdentity,
    ) -> Result<Option<SessionHandle>, RegistryError> {
        let mut pool = self.pool_mut(identity.shard_id)?;
        Ok(pool.lookup(identity))
    }

    /// Exclusive-access lookup: additionally `None` while the owner is busy.
    pub fn lookup_idle(
        &self,
        identity: &SessionIdentity,
    ) -> Result<Option<SessionHandle>, RegistryError> {
        let mut pool = self.pool_mut(identity.shard_id)?;
        Ok(pool.lookup_idle(identity))
    }

    /// Lookup without a liveness touch. Diagnostics.
    pub fn peek(
        &self,
        identity: &SessionIdentity,
    ) -> Result<Option<SessionHandle>, RegistryError> {
        let pool = self.pool_mut(identity.shard_id)?;
        Ok(pool.peek(identity))
    }

    /// Destroy a session. `false` for any stale identity — idempotent.
    pub fn destroy(&self, identity: &SessionIdentity) -> Result<bool, RegistryError> {
        let destroyed = {
            let mut pool = self.pool_mut(identity.shard_id)?;
            pool.destroy(identity)
        };
        if destroyed {
            self.active[identity.shard_id as usize].fetch_sub(1, Ordering::Relaxed);
        }
        Ok(destroyed)
    }

    /// Decode an ASCII token and look the session up.
    ///
    /// Front ends hand tokens straight from cookies and URI path segments;
    /// a malformed one means "invalid or absent session".
    pub fn resolve_token(&self, token: &[u8]) -> Result<Option<SessionHandle>, RegistryError> {
        let identity = SessionIdentity::decode_ascii(token)?;
        self.lookup(&identity)
    }

    /// Run one eviction pass on `shard_id`. Driven by the shard's own timer;
    /// never invoked concurrently for one shard.
    pub fn sweep_shard(&self, shard_id: u8) -> Result<SweepReport, RegistryError> {
        let report = {
            let mut pool = self.pool_mut(shard_id)?;
            pool.sweep()
        };
        if report.evicted > 0 {
            self.active[shard_id as usize].fetch_sub(report.evicted, Ordering::Relaxed);
            tracing::debug!(
                shard_id,
                tick = report.tick,
                evicted = report.evicted,
                skipped_busy = report.skipped_busy,
                "evicted inactive sessions"
            );
        }
        Ok(report)
    }

    // ── Stats ────────────────────────────────────────────────────────────────

    /// Live-session count per shard. Readable from any thread.
    pub fn active_counts(&self) -> Vec<u32> {
        self.active
            .iter()
            .map(|count| count.load(Ordering::Relaxed))
            .collect()
    }

    /// Total live sessions across all shards.
    pub fn active_total(&self) -> u64 {
        self.active
            .iter()
            .map(|count| u64::from(count.load(Ordering::Relaxed)))
            .sum()
    }

    // ── Internals ────────────────────────────────────────────────────────────

    /// Affinity-checked access to a shard's pool.
    fn pool_mut(
        &self,
        shard_id: u8,
    ) -> Result<std::cell::RefMut<'_, ShardSessionPool>, RegistryError> {
        let current = shard::current();
        if current != Some(shard_id) {
            tracing::warn!(
                target_shard = shard_id,
                current_shard = ?current,
                "cross-shard session access denied"
            );
            return Err(RegistryError::CrossShardAccessDenied {
                target: shard_id,
                current,
            });
        }
        let Some(cell) = self.shards.get(shard_id as usize) else {
            // A scope was entered for a shard this registry does not have.
            return Err(RegistryError::CrossShardAccessDenied {
                target: shard_id,
                current,
            });
        };
        match cell.0.try_borrow_mut() {
            Ok(pool) => Ok(pool),
            // Only reachable by re-entering the registry from an owner
            // callback; the pool's bookkeeping is already consistent, but the
            // aliasing itself is a programming error.
            Err(_) => panic!("re-entrant access to session pool on shard {shard_id}"),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
