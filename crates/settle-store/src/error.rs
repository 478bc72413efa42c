//! # Store Errors
//!
//! Format and write-once failures arrive wrapped from `settle-core` as
//! [`StoreError::Integrity`]; everything else here is about the backing
//! collection.

use settle_core::IntegrityError;
use thiserror::Error;

/// Errors raised by evidence stores and document collections.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Validation or write-once guard rejected the write. Nothing was written.
    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    /// `insert_one` hit an existing document with the same key.
    #[error("{collection} document {key} already exists")]
    DuplicateKey {
        collection: &'static str,
        key: String,
    },

    /// A unique index rejected the write.
    #[error("unique index {index} violated")]
    UniqueViolation { index: String },

    /// A stored document could not be decoded into its record type.
    #[error("stored {collection} document {key} is unreadable: {reason}")]
    Corrupt {
        collection: &'static str,
        key: String,
        reason: String,
    },

    /// A record could not be encoded for storage.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The database backend failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Whether the error is a seal violation (write-once, payload gating,
    /// status transition) as opposed to a format problem or backend failure.
    pub fn is_seal_violation(&self) -> bool {
        matches!(self, Self::Integrity(e) if e.is_seal_violation())
    }

    /// Whether the error reflects a caller conflict rather than a fault.
    pub fn is_conflict(&self) -> bool {
        self.is_seal_violation()
            || matches!(self, Self::DuplicateKey { .. } | Self::UniqueViolation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use settle_core::WriteOnceReason;

    #[test]
    fn write_once_is_a_conflict() {
        let err = StoreError::from(IntegrityError::WriteOnceViolation {
            field: "exportManifestHash".into(),
            reason: WriteOnceReason::CannotChange,
        });
        assert!(err.is_seal_violation());
        assert!(err.is_conflict());
        assert!(err.to_string().contains("exportManifestHash"));
    }

    #[test]
    fn format_error_is_not_a_conflict() {
        let err = StoreError::from(IntegrityError::InvalidHashFormat {
            field: "paymentSnapshotHash".into(),
        });
        assert!(!err.is_conflict());
    }

    #[test]
    fn duplicate_key_is_a_conflict() {
        let err = StoreError::DuplicateKey {
            collection: "export_manifests",
            key: "ORD-1".into(),
        };
        assert!(err.is_conflict());
        assert!(!err.is_seal_violation());
    }
}
