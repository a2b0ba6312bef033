//! The session-owner capability contract.
//!
//! A session's payload — the application-level object the identity grants
//! access to — lives outside the registry. The registry holds only a weak
//! back reference and drives the owner through this contract: busy/idle
//! signaling for exclusive access, and a destruction callback.
//!
//! The registry never extends the owner's lifetime. If the owner has been
//! dropped, its handle stops upgrading and callbacks are simply skipped.

use std::sync::Weak;

/// Contract every session payload must satisfy.
///
/// Implementations signal their own busy state with interior mutability;
/// all calls for one session arrive from that session's shard context.
pub trait SessionOwner: Send + Sync {
    /// Is the owner currently in use by a task?
    fn is_busy(&self) -> bool;

    /// Enter exclusive use.
    fn mark_busy(&self);

    /// Leave exclusive use.
    fn mark_idle(&self);

    /// The session has been destroyed.
    ///
    /// Called at most once, only while the owner is marked busy, and only
    /// after the slot has already been reset and returned to the free list —
    /// the owner gets a safe window to release its own resources without
    /// racing a concurrent lookup.
    fn on_destroyed(&self);
}

/// Non-owning back reference from a session to its owner.
pub type OwnerHandle = Weak<dyn SessionOwner>;
