//! # Canonicalization
//!
//! Routes:
//! - POST /v1/canonicalize — Canonical JSON text and SHA-256 of a payload
//!
//! Stateless. Lets a producer check what `finalize` would seal before
//! committing to it.

use axum::extract::rejection::JsonRejection;
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;
use settle_core::{canonicalize, SettlementPayloadInput};

use crate::error::AppError;
use crate::extractors::extract_json;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalizeResponse {
    pub canonical_json: String,
    pub sha256: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/canonicalize", post(canonicalize_payload))
}

async fn canonicalize_payload(
    body: Result<Json<SettlementPayloadInput>, JsonRejection>,
) -> Result<Json<CanonicalizeResponse>, AppError> {
    let payload = extract_json(body)?;
    let canonical = canonicalize(&payload)?;
    Ok(Json(CanonicalizeResponse {
        sha256: canonical.sha256().to_string(),
        canonical_json: canonical.into_string(),
    }))
}
