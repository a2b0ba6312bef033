//! Session identity wire format.
//!
//! A session identity is the capability a client holds to reach its session:
//! a cryptographically random salt plus the (shard, slot) address of the slot
//! the session occupies. It has two serialized forms, both views onto the
//! same 128 bits:
//!
//!   - ASCII: 24 uppercase hex characters, carried in cookies and URI path
//!     segments. Fixed width, no separators — external systems treat it as
//!     an opaque token.
//!   - Binary: two 64-bit words, bit-identical to the in-memory layout. Used
//!     when the front-end network layer hands an identity to the registry
//!     without a text round-trip.
//!
//! The salt is what makes identities unguessable. Decoding validates shape
//! only; whether the identity names a live session is the pool's business.
//!
//! The type is #[repr(C)] with explicit reserved padding for deterministic
//! layout and uses zerocopy derives for allocation-free serialization.

use static_assertions::assert_eq_size;
use zerocopy::{AsBytes, FromBytes, FromZeroes};

use crate::rng::SaltRng;

/// Length of the ASCII token: 16 salt digits + 6 slot digits + 2 shard digits.
pub const TOKEN_LEN: usize = 24;

/// Salt value carried by freed slots. Live sessions never use it — the salt
/// generator re-draws on this value.
pub const INVALID_SALT: u64 = 0;

/// Slot index that names no slot.
pub const INVALID_SLOT_INDEX: u32 = u32::MAX;

/// Routing tag meaning "no originating network worker". The ASCII token does
/// not carry the routing tag, so decoding restores it as this value.
pub const ROUTING_NONE: u8 = u8::MAX;

/// Largest slot index the 6-digit token field can carry.
pub const MAX_SLOT_INDEX: u32 = 0x00FF_FFFF;

// ── Identity ──────────────────────────────────────────────────────────────────

/// A session's public identity. Copied freely; no ownership semantics.
///
/// `(shard_id, slot_index, salt)` names at most one live session at any
/// instant. `routing_id` is an opaque secondary routing tag (the originating
/// network worker) — carried, never validated.
///
/// Wire size: 16 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsBytes, FromBytes, FromZeroes)]
#[repr(C)]
pub struct SessionIdentity {
    /// Cryptographically random, regenerated on every creation.
    pub salt: u64,

    /// Index into the owning shard's slot array.
    pub slot_index: u32,

    /// Selects the owning shard pool. Immutable for the identity's lifetime.
    pub shard_id: u8,

    /// Opaque secondary routing tag. Informational only.
    pub routing_id: u8,

    /// Padding to a 128-bit wire size. Always zero.
    reserved: [u8; 2],
}

// Compile-time size guard. If this fails, the wire format has silently changed.
assert_eq_size!(SessionIdentity, [u8; 16]);

impl SessionIdentity {
    pub fn new(shard_id: u8, slot_index: u32, salt: u64, routing_id: u8) -> Self {
        Self {
            salt,
            slot_index,
            shard_id,
            routing_id,
            reserved: [0; 2],
        }
    }

    /// Mint an identity for a slot with a fresh salt from `rng`.
    ///
    /// The salt is drawn independently of the slot address and the clock, so
    /// two identities differing only in when they were generated are
    /// indistinguishable without the salt.
    pub fn generate(shard_id: u8, slot_index: u32, routing_id: u8, rng: &mut SaltRng) -> Self {
        Self::new(shard_id, slot_index, rng.next_salt(), routing_id)
    }

    // ── ASCII form ───────────────────────────────────────────────────────────

    /// Encode as the 24-character uppercase hex token.
    ///
    /// Layout: salt (16 digits), slot index (6 digits), shard id (2 digits),
    /// each field most-significant-digit-first, zero-padded.
    pub fn encode_ascii(&self) -> [u8; TOKEN_LEN] {
        debug_assert!(self.slot_index <= MAX_SLOT_INDEX);

        let mut out = [0u8; TOKEN_LEN];
        write_hex(self.salt, &mut out[0..16]);
        write_hex(u64::from(self.slot_index), &mut out[16..22]);
        write_hex(u64::from(self.shard_id), &mut out[22..24]);
        out
    }

    /// Decode an ASCII token. Case-insensitive.
    ///
    /// Fails on wrong length or any non-hex byte. Does not validate liveness.
    /// The token carries no routing tag; `routing_id` comes back as
    /// [`ROUTING_NONE`].
    pub fn decode_ascii(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() != TOKEN_LEN {
            return Err(DecodeError::MalformedToken);
        }

        let salt = parse_hex(&bytes[0..16])?;
        let slot_index = parse_hex(&bytes[16..22])? as u32;
        let shard_id = parse_hex(&bytes[22..24])? as u8;

        Ok(Self::new(shard_id, slot_index, salt, ROUTING_NONE))
    }

    // ── Binary form ──────────────────────────────────────────────────────────

    /// Reinterpret the identity as two 64-bit words (native byte order).
    ///
    /// The words are a bit-for-bit view of the in-memory layout, so they
    /// round-trip exactly through [`Self::from_words`].
    pub fn to_words(&self) -> (u64, u64) {
        let bytes = self.as_bytes();
        let lower = u64::from_ne_bytes(bytes[0..8].try_into().unwrap());
        let upper = u64::from_ne_bytes(bytes[8..16].try_into().unwrap());
        (lower, upper)
    }

    /// Rebuild an identity from the two words produced by [`Self::to_words`].
    pub fn from_words(lower: u64, upper: u64) -> Self {
        let mut bytes = [0u8; 16];
        bytes[0..8].copy_from_slice(&lower.to_ne_bytes());
        bytes[8..16].copy_from_slice(&upper.to_ne_bytes());
        // Infallible: every 16-byte pattern is a valid identity.
        SessionIdentity::read_from(&bytes[..]).unwrap()
    }
}

/// Cheap shape check: is this byte slice exactly one well-formed token?
///
/// Lets front ends test a cookie value or URI path segment without paying for
/// a full decode on the miss path.
pub fn is_token(bytes: &[u8]) -> bool {
    bytes.len() == TOKEN_LEN && bytes.iter().all(u8::is_ascii_hexdigit)
}

// ── Hex helpers ───────────────────────────────────────────────────────────────

const HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";

/// Write `value` into `out` as fixed-width uppercase hex, MSB first.
fn write_hex(value: u64, out: &mut [u8]) {
    let digits = out.len();
    for (i, byte) in out.iter_mut().enumerate() {
        let shift = 4 * (digits - 1 - i);
        *byte = HEX_UPPER[((value >> shift) & 0xF) as usize];
    }
}

/// Parse fixed-width hex, accepting both cases.
fn parse_hex(digits: &[u8]) -> Result<u64, DecodeError> {
    let mut value = 0u64;
    for &b in digits {
        let nibble = match b {
            b'0'..=b'9' => b - b'0',
            b'a'..=b'f' => b - b'a' + 10,
            b'A'..=b'F' => b - b'A' + 10,
            _ => return Err(DecodeError::MalformedToken),
        };
        value = (value << 4) | u64::from(nibble);
    }
    Ok(value)
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// A token failed to decode. Always recoverable — callers surface it as
/// "invalid or absent session", never as a fatal condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed session token: expected {TOKEN_LEN} hex characters")]
    MalformedToken,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
