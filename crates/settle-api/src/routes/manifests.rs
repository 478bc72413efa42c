//! # Export Manifests
//!
//! Routes:
//! - POST /v1/manifests — Create a manifest record (409 if one exists)
//! - PUT  /v1/manifests — Create or update; sealed hashes are write-once
//! - GET  /v1/manifests/{order_id} — Latest manifest record for an order

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use settle_store::{ExportManifestInput, ExportManifestRecord};

use crate::error::AppError;
use crate::extractors::extract_json;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/manifests", post(create_manifest).put(upsert_manifest))
        .route("/v1/manifests/{order_id}", get(get_manifest))
}

async fn create_manifest(
    State(state): State<AppState>,
    body: Result<Json<ExportManifestInput>, JsonRejection>,
) -> Result<(StatusCode, Json<ExportManifestRecord>), AppError> {
    let input = extract_json(body)?;
    let record = state.stores.manifests.create(input).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn upsert_manifest(
    State(state): State<AppState>,
    body: Result<Json<ExportManifestInput>, JsonRejection>,
) -> Result<Json<ExportManifestRecord>, AppError> {
    let input = extract_json(body)?;
    Ok(Json(state.stores.manifests.upsert(input).await?))
}

async fn get_manifest(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<ExportManifestRecord>, AppError> {
    state
        .stores
        .manifests
        .get_latest_by_order_id(&order_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no export manifest for order {order_id}")))
}
