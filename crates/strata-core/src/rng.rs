//! Per-shard salt generation.
//!
//! Session salts must be unguessable, so they come from a cryptographically
//! secure generator. Each shard owns its own instance, seeded once from OS
//! entropy at shard construction — drawing a salt never takes a process-wide
//! lock, and shards never serialize against each other on the request path.

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::identity::INVALID_SALT;

/// A shard-local source of session salts.
pub struct SaltRng(StdRng);

impl SaltRng {
    /// Seed from OS entropy. Call once per shard, at shard construction.
    pub fn from_entropy() -> Self {
        Self(StdRng::from_entropy())
    }

    /// Deterministic generator for tests. Salts are still well distributed,
    /// just reproducible.
    pub fn seeded(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }

    /// Draw a fresh salt. Never returns [`INVALID_SALT`] — that value marks
    /// freed slots, and a live session must not be reachable with it.
    pub fn next_salt(&mut self) -> u64 {
        loop {
            let salt = self.0.next_u64();
            if salt != INVALID_SALT {
                return salt;
            }
        }
    }
}

impl std::fmt::Debug for SaltRng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never expose generator state.
        f.write_str("SaltRng")
    }
}
