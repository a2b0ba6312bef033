//! strata-core — session identity wire format, salt RNG, and configuration.
//! All other Strata crates depend on this one.

pub mod config;
pub mod identity;
pub mod rng;

pub use identity::{DecodeError, SessionIdentity};
pub use rng::SaltRng;
