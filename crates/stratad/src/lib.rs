//! stratad — the shard runtime for the Strata session registry.
//!
//! Gives the registry its single-writer execution contexts: one dedicated
//! worker thread per shard, each owning its shard's scope, draining a command
//! queue, and ticking the eviction sweep on a steady cadence. The
//! [`ShardRouter`] is the cloneable client surface — it routes every
//! operation to the owning shard's queue by the shard id embedded in the
//! identity, so callers never need shard affinity of their own.

pub mod router;
pub mod runtime;
mod worker;

pub use router::{RouterError, ShardRouter};
pub use runtime::ShardRuntime;
