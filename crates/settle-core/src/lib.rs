//! # settle-core — Foundational Types for the Settlement Integrity Chain
//!
//! This crate is the bedrock of the settlement integrity workspace. It holds
//! the pure, I/O-free pieces every other crate builds on: hash format
//! validation, canonical settlement serialization, SHA-256 chain roots, and
//! the write-once guard. It depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Validated hash newtype.** `Sha256Hex` can only hold 64 lowercase hex
//!    characters. No bare strings for digests past the boundary.
//!
//! 2. **`CanonicalBytes` newtype.** Structured data is hashed only after
//!    `CanonicalBytes::new()` (float rejection + RFC 8785). The settlement
//!    payload reaches it through `payload::canonicalize`.
//!
//! 3. **Integer money.** Normalized amounts are `MinorUnits(i64)`; a
//!    fractional amount cannot be represented, so it cannot be hashed.
//!
//! 4. **UTC-only timestamps.** `Timestamp` requires a `Z` suffix and renders
//!    with millisecond precision.
//!
//! 5. **Guards are pure.** `guard::ensure_write_once` and
//!    `guard::ensure_canonical_payload` look only at existing and proposed
//!    state, so stores run them inside their atomic update.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `settle-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod canonical;
pub mod chain;
pub mod clock;
pub mod error;
pub mod guard;
pub mod hash;
pub mod payload;
pub mod temporal;

// Re-export primary types for ergonomic imports.
pub use canonical::CanonicalBytes;
pub use chain::{chain_root, hash_bytes, hash_canonical, ChainHashes};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CanonicalizationError, IntegrityError, WriteOnceReason};
pub use guard::{
    ensure_canonical_payload, ensure_write_once, FieldPatch, SettlementStatus,
    CANONICAL_PAYLOAD_FIELD,
};
pub use hash::{is_valid_sha256_hex, Sha256Hex, SHA256_HEX_LEN};
pub use payload::{
    canonicalize, normalize, AmountsInput, CanonicalJson, CanonicalSettlementPayload,
    ComplianceInput, LaneInput, MinorUnits, SettlementAmounts, SettlementPayloadInput,
};
pub use temporal::Timestamp;
