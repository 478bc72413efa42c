//! # Integrity Verification
//!
//! Routes:
//! - POST /v1/integrity/verify — Verify one order's chain
//!
//! A FAIL verdict is a 200 with the result body. Only an unanswerable
//! request (blank order id, malformed declared root, backend down) is an
//! error status.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use settle_verify::IntegrityVerificationResult;

use crate::error::AppError;
use crate::extractors::extract_json;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VerifyRequest {
    pub order_id: String,
    #[serde(default)]
    pub declared_chain_root_sha256: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/integrity/verify", post(verify_order))
}

async fn verify_order(
    State(state): State<AppState>,
    body: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<IntegrityVerificationResult>, AppError> {
    let req = extract_json(body)?;
    let result = state
        .verifier
        .verify(&req.order_id, req.declared_chain_root_sha256.as_deref())
        .await?;
    crate::metrics::record_verification(&result);
    Ok(Json(result))
}
