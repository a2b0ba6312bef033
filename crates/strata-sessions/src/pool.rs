//! Per-shard session slot pool.
//!
//! A pool is a fixed arena of slots plus two index lists threaded through the
//! slots themselves: a free list (LIFO stack, singly linked) and a used list
//! (insertion-ordered, doubly linked so destruction unlinks in O(1)). Every
//! slot index is on exactly one of the two lists at all times. Creating and
//! destroying sessions moves indexes between the lists and never allocates
//! per session — a destroyed slot is reset in place and its index reused.
//!
//! Session addresses are validated by salt: a lookup with the right slot
//! index but the wrong salt is indistinguishable from "no such session", so
//! an identity cannot be forged by guessing indexes.
//!
//! Eviction runs on a shard-local logical clock. Every sweep advances the
//! tick and walks at most the used-list length it started with; sessions
//! whose inactivity exceeds their tick budget are destroyed through the same
//! path as an explicit destroy.
//!
//! A pool is exclusively owned by its shard's execution context. Nothing in
//! here is synchronized — see the registry for how affinity is enforced.

use std::sync::{Arc, Weak};
use std::time::SystemTime;

use strata_core::identity::{INVALID_SALT, MAX_SLOT_INDEX, ROUTING_NONE};
use strata_core::{SaltRng, SessionIdentity};

use crate::owner::{OwnerHandle, SessionOwner};

/// Sentinel for "no slot" in the intrusive index links.
const NIL: u32 = u32::MAX;

// ── Slot ──────────────────────────────────────────────────────────────────────

/// One arena position. Holds at most one live session at a time.
struct Slot {
    /// Random salt of the occupying session; [`INVALID_SALT`] while free.
    salt: u64,
    alive: bool,

    /// Weak back reference to the session's capability object.
    owner: Option<OwnerHandle>,
    /// Label of the logical application the session belongs to. Diagnostic.
    owner_tag: Arc<str>,
    routing_id: u8,

    /// Wall-clock stamps, diagnostic only — eviction never reads them.
    created_at: SystemTime,
    last_active_at: SystemTime,

    /// Logical liveness, in shard ticks.
    last_active_tick: u64,
    timeout_ticks: u64,

    /// Intrusive links: free list uses `next` only; used list uses both.
    prev: u32,
    next: u32,
}

impl Slot {
    fn vacant(next: u32, empty_tag: Arc<str>) -> Self {
        Self {
            salt: INVALID_SALT,
            alive: false,
            owner: None,
            owner_tag: empty_tag,
            routing_id: ROUTING_NONE,
            created_at: SystemTime::UNIX_EPOCH,
            last_active_at: SystemTime::UNIX_EPOCH,
            last_active_tick: 0,
            timeout_ticks: 0,
            prev: NIL,
            next,
        }
    }
}

// ── Handle ────────────────────────────────────────────────────────────────────

/// Snapshot of a live session, returned by lookups.
///
/// Owned and cheap to clone — it borrows nothing from the pool, so holding
/// one never blocks pool operations. The owner reference stays weak.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub identity: SessionIdentity,
    pub owner: Option<OwnerHandle>,
    pub owner_tag: Arc<str>,
    pub created_at: SystemTime,
    pub last_active_at: SystemTime,
}

impl SessionHandle {
    /// Upgrade the weak owner reference, if the owner is still around.
    pub fn owner(&self) -> Option<Arc<dyn SessionOwner>> {
        self.owner.as_ref().and_then(Weak::upgrade)
    }
}

/// What one sweep pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// The tick this sweep established.
    pub tick: u64,
    /// Used-list entries examined.
    pub checked: u32,
    /// Sessions destroyed for inactivity.
    pub evicted: u32,
    /// Expired sessions left in place because their owner was busy.
    pub skipped_busy: u32,
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// No free slot was available on `create`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("session pool exhausted on shard {shard_id}")]
pub struct PoolExhausted {
    pub shard_id: u8,
}

// ── Pool ──────────────────────────────────────────────────────────────────────

/// All sessions belonging to one shard.
pub struct ShardSessionPool {
    shard_id: u8,
    slots: Box<[Slot]>,

    /// Head of the free-index stack (linked through `Slot::next`).
    free_head: u32,
    /// Insertion-ordered used list.
    used_head: u32,
    used_tail: u32,
    used_len: u32,

    /// Shard-local logical clock, advanced by `sweep`.
    tick: u64,

    rng: SaltRng,
    empty_tag: Arc<str>,
}

impl ShardSessionPool {
    /// Build a pool with a fixed slot capacity.
    ///
    /// Capacity is fixed for the pool's lifetime and must be addressable by
    /// the 6-hex-digit slot field of the ASCII token.
    pub fn new(shard_id: u8, capacity: u32, rng: SaltRng) -> Self {
        assert!(capacity >= 1, "a pool needs at least one slot");
        assert!(
            capacity <= MAX_SLOT_INDEX + 1,
            "capacity {capacity} exceeds the token-addressable slot range"
        );

        let empty_tag: Arc<str> = Arc::from("");
        let slots = (0..capacity)
            .map(|i| {
                let next = if i + 1 < capacity { i + 1 } else { NIL };
                Slot::vacant(next, empty_tag.clone())
            })
            .collect();

        Self {
            shard_id,
            slots,
            free_head: 0,
            used_head: NIL,
            used_tail: NIL,
            used_len: 0,
            tick: 0,
            rng,
            empty_tag,
        }
    }

    pub fn shard_id(&self) -> u8 {
        self.shard_id
    }

    pub fn capacity(&self) -> u32 {
        self.slots.len() as u32
    }

    /// Number of live sessions.
    pub fn active_sessions(&self) -> u32 {
        self.used_len
    }

    /// Current value of the shard's logical clock.
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    // ── Create ───────────────────────────────────────────────────────────────

    /// Occupy a free slot with a new session and hand back its identity.
    ///
    /// The salt is drawn fresh from the shard's RNG on every call — identities
    /// are never predictable from the slot index or creation time. Fails with
    /// [`PoolExhausted`] when every slot is in use.
    pub fn create(
        &mut self,
        owner: Option<OwnerHandle>,
        routing_id: u8,
        timeout_ticks: u64,
        owner_tag: impl Into<Arc<str>>,
    ) -> Result<SessionIdentity, PoolExhausted> {
        if self.free_head == NIL {
            return Err(PoolExhausted {
                shard_id: self.shard_id,
            });
        }

        let index = self.free_head;
        let identity = SessionIdentity::generate(self.shard_id, index, routing_id, &mut self.rng);
        let now = SystemTime::now();
        let tick = self.tick;
        let tail = self.used_tail;

        {
            let slot = &mut self.slots[index as usize];
            self.free_head = slot.next;

            slot.salt = identity.salt;
            slot.alive = true;
            slot.owner = owner;
            slot.owner_tag = owner_tag.into();
            slot.routing_id = routing_id;
            slot.created_at = now;
            slot.last_active_at = now;
            slot.last_active_tick = tick;
            slot.timeout_ticks = timeout_ticks;
            slot.prev = tail;
            slot.next = NIL;
        }

        // Append to the used list: sweep order is insertion order.
        if tail != NIL {
            self.slots[tail as usize].next = index;
        } else {
            self.used_head = index;
        }
        self.used_tail = index;
        self.used_len += 1;

        tracing::trace!(
            shard_id = self.shard_id,
            slot_index = index,
            "session created"
        );
        Ok(identity)
    }

    // ── Lookup ───────────────────────────────────────────────────────────────

    /// Find a live session and touch its liveness.
    ///
    /// A wrong salt returns `None` exactly like an absent session — callers
    /// cannot distinguish "never existed" from "stale identity".
    pub fn lookup(&mut self, identity: &SessionIdentity) -> Option<SessionHandle> {
        let index = self.index_if_valid(identity)?;
        self.touch_at(index);
        Some(self.handle_at(index))
    }

    /// Find a live session for exclusive use.
    ///
    /// Like [`Self::lookup`], but a session whose owner reports itself busy
    /// is withheld: alive and available-for-use are distinct predicates.
    pub fn lookup_idle(&mut self, identity: &SessionIdentity) -> Option<SessionHandle> {
        let index = self.index_if_valid(identity)?;
        if owner_is_busy(&self.slots[index]) {
            return None;
        }
        self.touch_at(index);
        Some(self.handle_at(index))
    }

    /// Find a live session without touching its liveness. Diagnostics.
    pub fn peek(&self, identity: &SessionIdentity) -> Option<SessionHandle> {
        let index = self.index_if_valid(identity)?;
        Some(self.handle_at(index))
    }

    // ── Destroy ──────────────────────────────────────────────────────────────

    /// Destroy a live session. Idempotent: a stale identity (wrong salt,
    /// already-freed slot, out-of-range index) is a `false` no-op.
    pub fn destroy(&mut self, identity: &SessionIdentity) -> bool {
        let Some(index) = self.index_if_valid(identity) else {
            return false;
        };
        self.destroy_at(index);
        true
    }

    /// Tear down the session at `index`. Caller has validated the slot.
    fn destroy_at(&mut self, index: usize) {
        let owner = self.slots[index].owner.take().and_then(|w| w.upgrade());

        // Exclusive-access window for the whole teardown.
        if let Some(owner) = &owner {
            owner.mark_busy();
        }

        self.unlink_used(index as u32);
        self.reset_slot(index);

        // The slot is already reset and back on the free list: an owner
        // callback that re-enters the registry observes consistent state.
        if let Some(owner) = owner {
            owner.on_destroyed();
            owner.mark_idle();
        }

        tracing::trace!(
            shard_id = self.shard_id,
            slot_index = index,
            "session destroyed"
        );
    }

    // ── Sweep ────────────────────────────────────────────────────────────────

    /// Advance the shard clock one tick and evict timed-out sessions.
    ///
    /// Walks at most the used-list length present at entry, so one call
    /// always terminates even as destruction shrinks the list mid-pass.
    /// Expired sessions whose owner is busy are left for a later tick.
    pub fn sweep(&mut self) -> SweepReport {
        self.tick += 1;
        let now_tick = self.tick;

        let budget = self.used_len;
        let mut cursor = self.used_head;
        let mut checked = 0u32;
        let mut evicted = 0u32;
        let mut skipped_busy = 0u32;

        while cursor != NIL && checked < budget {
            let index = cursor as usize;
            // Capture the successor before any destruction: unlinking this
            // entry relinks its neighbors but leaves the successor in place.
            cursor = self.slots[index].next;
            checked += 1;

            let slot = &self.slots[index];
            if now_tick - slot.last_active_tick <= slot.timeout_ticks {
                continue;
            }

            if owner_is_busy(slot) {
                skipped_busy += 1;
                continue;
            }

            self.destroy_at(index);
            evicted += 1;
        }

        SweepReport {
            tick: now_tick,
            checked,
            evicted,
            skipped_busy,
        }
    }

    // ── Internals ────────────────────────────────────────────────────────────

    /// Validate an identity against current pool state.
    ///
    /// Bounds-checks the index, then requires a live slot whose stored salt
    /// matches. All failure modes collapse to `None`.
    fn index_if_valid(&self, identity: &SessionIdentity) -> Option<usize> {
        if identity.shard_id != self.shard_id {
            return None;
        }
        let index = identity.slot_index as usize;
        let slot = self.slots.get(index)?;
        if !slot.alive || slot.salt != identity.salt {
            return None;
        }
        Some(index)
    }

    fn touch_at(&mut self, index: usize) {
        let tick = self.tick;
        let slot = &mut self.slots[index];
        slot.last_active_tick = tick;
        slot.last_active_at = SystemTime::now();
    }

    fn handle_at(&self, index: usize) -> SessionHandle {
        let slot = &self.slots[index];
        SessionHandle {
            identity: SessionIdentity::new(
                self.shard_id,
                index as u32,
                slot.salt,
                slot.routing_id,
            ),
            owner: slot.owner.clone(),
            owner_tag: slot.owner_tag.clone(),
            created_at: slot.created_at,
            last_active_at: slot.last_active_at,
        }
    }

    /// Remove `index` from the used list.
    fn unlink_used(&mut self, index: u32) {
        let (prev, next) = {
            let slot = &self.slots[index as usize];
            (slot.prev, slot.next)
        };
        if prev != NIL {
            self.slots[prev as usize].next = next;
        } else {
            self.used_head = next;
        }
        if next != NIL {
            self.slots[next as usize].prev = prev;
        } else {
            self.used_tail = prev;
        }
        self.used_len -= 1;
    }

    /// Reset a slot's contents and push its index onto the free stack.
    fn reset_slot(&mut self, index: usize) {
        let empty_tag = self.empty_tag.clone();
        let free_head = self.free_head;
        let slot = &mut self.slots[index];
        slot.salt = INVALID_SALT;
        slot.alive = false;
        slot.owner = None;
        slot.owner_tag = empty_tag;
        slot.routing_id = ROUTING_NONE;
        slot.prev = NIL;
        slot.next = free_head;
        self.free_head = index as u32;
    }

    /// Assert the free/used partition invariant: every index is on exactly
    /// one of the two lists, and list lengths are consistent.
    #[cfg(test)]
    pub(crate) fn check_partition(&self) {
        let capacity = self.slots.len();
        let mut seen = vec![0u8; capacity];

        let mut cursor = self.free_head;
        while cursor != NIL {
            seen[cursor as usize] += 1;
            assert!(!self.slots[cursor as usize].alive, "free slot marked alive");
            cursor = self.slots[cursor as usize].next;
        }

        let mut used = 0u32;
        let mut cursor = self.used_head;
        let mut prev = NIL;
        while cursor != NIL {
            seen[cursor as usize] += 1;
            used += 1;
            let slot = &self.slots[cursor as usize];
            assert!(slot.alive, "used slot not alive");
            assert_eq!(slot.prev, prev, "used list back-link broken");
            prev = cursor;
            cursor = slot.next;
        }
        assert_eq!(prev, self.used_tail, "used tail out of sync");
        assert_eq!(used, self.used_len, "used length out of sync");

        for (index, count) in seen.iter().enumerate() {
            assert_eq!(
                *count, 1,
                "slot {index} is on {count} lists, expected exactly one"
            );
        }
    }
}

fn owner_is_busy(slot: &Slot) -> bool {
    slot.owner
        .as_ref()
        .and_then(Weak::upgrade)
        .map(|owner| owner.is_busy())
        .unwrap_or(false)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
