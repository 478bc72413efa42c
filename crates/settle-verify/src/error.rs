//! # Verifier Errors
//!
//! The verifier fails with an error only when it cannot answer at all: no
//! order id, a declared root that is not a hash, or a source that is down.
//! Missing or mismatched evidence is an answer (a FAIL result), not an error.

use settle_core::IntegrityError;
use settle_store::StoreError;
use thiserror::Error;

/// Failure of an external read source (order database, file store).
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid source configuration: {0}")]
    InvalidConfig(String),
}

/// Errors returned by [`IntegrityChainVerifier::verify`](crate::IntegrityChainVerifier::verify).
#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("orderId is required")]
    MissingOrderId,

    #[error("invalid declared chain root: {0}")]
    InvalidDeclaredRoot(#[source] IntegrityError),

    #[error("{what} unavailable: {error}")]
    Store {
        what: &'static str,
        #[source]
        error: StoreError,
    },

    #[error("{what} unavailable: {error}")]
    Source {
        what: &'static str,
        #[source]
        error: SourceError,
    },
}

impl VerifyError {
    /// Whether the caller sent a bad request, as opposed to a backend fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::MissingOrderId | Self::InvalidDeclaredRoot(_))
    }
}
