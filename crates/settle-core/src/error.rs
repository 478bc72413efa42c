//! # Error Types — Structured Error Hierarchy
//!
//! Errors raised at the validation boundary, before any I/O happens.
//! All errors use `thiserror` for derive-based `Display` and `Error`
//! implementations.
//!
//! ## Design
//!
//! - Format errors (malformed hash, non-integer amount, bad timestamp,
//!   wrong pinned literal) name the offending field.
//! - Write-once violations name the sealed field and whether the write
//!   tried to clear or change it.
//! - Verification mismatches are NOT errors. They live in `settle-verify`
//!   as typed FAIL results.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type for settlement integrity operations.
#[derive(Error, Debug)]
pub enum IntegrityError {
    /// A hash field is not exactly 64 lowercase hex characters.
    #[error("invalid hash format for {field}: expected 64 lowercase hex characters")]
    InvalidHashFormat {
        /// Name of the offending field.
        field: String,
    },

    /// Canonical serialization of a settlement payload failed.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// Attempted to clear or change a sealed field.
    #[error("write-once violation on {field}: {reason}")]
    WriteOnceViolation {
        /// Name of the sealed field.
        field: String,
        /// Whether the write tried to clear or change the value.
        reason: WriteOnceReason,
    },

    /// A canonical payload was written while the record is not FINAL.
    #[error("canonical settlement payload requires status FINAL, got {status}")]
    CanonicalPayloadRequiresFinal {
        /// The status the record would have after the write.
        status: String,
    },

    /// Settlement status transition is not permitted.
    #[error("invalid settlement status transition from {from} to {to}")]
    InvalidStatusTransition {
        /// Current status.
        from: String,
        /// Requested status.
        to: String,
    },

    /// A required identifier was blank or absent.
    #[error("missing required field: {0}")]
    MissingField(String),
}

impl IntegrityError {
    /// Name of the field this error is about, when there is one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::InvalidHashFormat { field }
            | Self::WriteOnceViolation { field, .. }
            | Self::MissingField(field) => Some(field.as_str()),
            Self::Canonicalization(inner) => inner.field(),
            Self::CanonicalPayloadRequiresFinal { .. } => Some(crate::guard::CANONICAL_PAYLOAD_FIELD),
            Self::InvalidStatusTransition { .. } => Some("status"),
        }
    }

    /// True for write-once and status-sealing violations, as opposed to
    /// format errors.
    pub fn is_seal_violation(&self) -> bool {
        matches!(
            self,
            Self::WriteOnceViolation { .. }
                | Self::CanonicalPayloadRequiresFinal { .. }
                | Self::InvalidStatusTransition { .. }
        )
    }
}

/// Why a write-once check rejected a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOnceReason {
    /// The write would have removed an existing value.
    CannotClear,
    /// The write would have replaced an existing value with a different one.
    CannotChange,
}

impl WriteOnceReason {
    /// Wire name of the reason.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CannotClear => "cannot_clear",
            Self::CannotChange => "cannot_change",
        }
    }
}

impl std::fmt::Display for WriteOnceReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values are not permitted in canonical representations.
    #[error("float values are not permitted in canonical representations: {0}")]
    FloatRejected(f64),

    /// A pinned field carried a value other than its single permitted literal.
    #[error("unsupported {field}: expected {expected:?}, got {actual:?}")]
    UnsupportedLiteral {
        /// Field name.
        field: &'static str,
        /// The only accepted value.
        expected: &'static str,
        /// The value that was supplied.
        actual: String,
    },

    /// A required string was empty after trimming.
    #[error("{0} must not be empty")]
    EmptyField(String),

    /// A monetary amount was fractional, non-finite, or out of range.
    #[error("{field} must be a finite integer amount in minor units")]
    NonIntegerAmount {
        /// Field name.
        field: String,
    },

    /// A timestamp was unparseable or not expressed in UTC with a `Z` suffix.
    #[error("{field} must be an RFC 3339 UTC timestamp ending in Z, got {value:?}")]
    InvalidTimestamp {
        /// Field name.
        field: String,
        /// The value that was supplied.
        value: String,
    },

    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

impl CanonicalizationError {
    /// Name of the offending field, when known.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::UnsupportedLiteral { field, .. } => Some(*field),
            Self::EmptyField(field)
            | Self::NonIntegerAmount { field }
            | Self::InvalidTimestamp { field, .. } => Some(field.as_str()),
            Self::FloatRejected(_) | Self::SerializationFailed(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_once_violation_display() {
        let err = IntegrityError::WriteOnceViolation {
            field: "exportManifestHash".to_string(),
            reason: WriteOnceReason::CannotChange,
        };
        let msg = err.to_string();
        assert!(msg.contains("exportManifestHash"));
        assert!(msg.contains("cannot_change"));
        assert!(err.is_seal_violation());
    }

    #[test]
    fn hash_format_is_not_a_seal_violation() {
        let err = IntegrityError::InvalidHashFormat {
            field: "paymentSnapshotHash".to_string(),
        };
        assert!(!err.is_seal_violation());
        assert_eq!(err.field(), Some("paymentSnapshotHash"));
    }

    #[test]
    fn canonicalization_field_is_forwarded() {
        let err = IntegrityError::from(CanonicalizationError::NonIntegerAmount {
            field: "amounts.gst".to_string(),
        });
        assert_eq!(err.field(), Some("amounts.gst"));
    }

    #[test]
    fn reason_serializes_snake_case() {
        let json = serde_json::to_string(&WriteOnceReason::CannotClear).unwrap();
        assert_eq!(json, "\"cannot_clear\"");
    }
}
