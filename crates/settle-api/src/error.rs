//! # API Error Types
//!
//! Maps store, guard and verifier errors to HTTP status codes with a JSON
//! body of the form `{"error": {"code", "message", "details"}}`.
//! Backend failures are logged and never echoed to the client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use settle_core::IntegrityError;
use settle_store::StoreError;
use settle_verify::VerifyError;
use thiserror::Error;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable code, e.g. `CONFLICT`.
    pub code: String,
    pub message: String,
    /// `{"field": ...}` for validation and conflict errors that name one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Error, Debug)]
pub enum AppError {
    /// 404.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed input (422).
    #[error("validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// A sealed field, status rule or unique key rejected the write (409).
    #[error("conflict: {message}")]
    Conflict {
        message: String,
        field: Option<String>,
    },

    /// 500. The message is logged, not returned.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
        }
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::Conflict { .. } => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } | Self::Conflict { field, .. } => field.as_deref(),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            Self::Internal(_) => {
                tracing::error!(error = %self, "internal server error");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details: self.field().map(|f| serde_json::json!({ "field": f })),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<IntegrityError> for AppError {
    fn from(err: IntegrityError) -> Self {
        let field = err.field().map(str::to_string);
        if let IntegrityError::WriteOnceViolation { field, .. } = &err {
            crate::metrics::record_write_once_violation(field);
        }
        if err.is_seal_violation() {
            Self::Conflict {
                message: err.to_string(),
                field,
            }
        } else {
            Self::Validation {
                message: err.to_string(),
                field,
            }
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Integrity(inner) => inner.into(),
            StoreError::DuplicateKey { .. } | StoreError::UniqueViolation { .. } => {
                Self::Conflict {
                    message: err.to_string(),
                    field: None,
                }
            }
            StoreError::Corrupt { .. }
            | StoreError::Serialization(_)
            | StoreError::Database(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<VerifyError> for AppError {
    fn from(err: VerifyError) -> Self {
        match &err {
            VerifyError::MissingOrderId => Self::Validation {
                message: err.to_string(),
                field: Some("orderId".into()),
            },
            VerifyError::InvalidDeclaredRoot(_) => Self::Validation {
                message: err.to_string(),
                field: Some("declaredChainRootSha256".into()),
            },
            VerifyError::Store { .. } | VerifyError::Source { .. } => {
                Self::Internal(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use settle_core::WriteOnceReason;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn write_once_is_conflict_with_field() {
        let err: AppError = StoreError::from(IntegrityError::WriteOnceViolation {
            field: "exportManifestHash".into(),
            reason: WriteOnceReason::CannotChange,
        })
        .into();
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "CONFLICT");
        assert_eq!(body["error"]["details"]["field"], "exportManifestHash");
    }

    #[tokio::test]
    async fn hash_format_is_validation_error() {
        let err: AppError = IntegrityError::InvalidHashFormat {
            field: "paymentSnapshotHash".into(),
        }
        .into();
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["details"]["field"], "paymentSnapshotHash");
    }

    #[tokio::test]
    async fn internal_error_hides_detail() {
        let (status, body) =
            body_json(AppError::Internal("connection refused to 10.0.0.5".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["message"], "An internal error occurred");
        assert!(body["error"].get("details").is_none());
    }

    #[test]
    fn status_transition_is_conflict() {
        let err: AppError = IntegrityError::InvalidStatusTransition {
            from: "FINAL".into(),
            to: "DRAFT".into(),
        }
        .into();
        assert_eq!(err.status_and_code().0, StatusCode::CONFLICT);
        assert_eq!(err.field(), Some("status"));
    }

    #[test]
    fn verifier_client_errors_are_validation() {
        let err: AppError = VerifyError::MissingOrderId.into();
        assert_eq!(err.status_and_code().1, "VALIDATION_ERROR");
        assert_eq!(err.field(), Some("orderId"));
    }
}
