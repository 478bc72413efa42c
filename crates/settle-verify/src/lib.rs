//! # settle-verify — Integrity Chain Verification
//!
//! [`IntegrityChainVerifier::verify`] answers one question for an order:
//! does the stored evidence still hash to what was sealed? It re-reads the
//! payment snapshot hash, the export manifest record (and file, when it can)
//! and the latest FINAL freight settlement, recomputes each hash, and either
//! returns PASS with the chain root or FAIL with exactly one
//! [`FailureClass`].
//!
//! Mismatches are results, not errors. [`VerifyError`] is reserved for
//! requests that cannot be answered.

pub mod error;
pub mod fs;
pub mod result;
pub mod sources;
pub mod verifier;

pub use error::{SourceError, VerifyError};
pub use fs::FsManifestReader;
pub use result::{
    Check, EvidenceTrail, FailureClass, IntegrityVerificationResult, ManifestHashSource,
    VerificationStatus,
};
pub use sources::{
    ManifestByteReader, ManifestLookup, MemorySnapshotSource, PaymentSnapshotSource,
    PgSnapshotSource, SettlementLookup,
};
pub use verifier::IntegrityChainVerifier;
