//! # Freight Settlements
//!
//! Routes:
//! - POST /v1/settlements — Create a settlement version
//! - PUT  /v1/settlements — Create or update a settlement version
//! - POST /v1/settlements/finalize — Seal a version from its payload
//! - GET  /v1/settlements/{order_id} — Highest version, any status
//! - GET  /v1/settlements/{order_id}/final — Highest FINAL version

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use settle_core::SettlementPayloadInput;
use settle_store::{EvidenceRefInput, FreightSettlementInput, FreightSettlementRecord};

use crate::error::AppError;
use crate::extractors::extract_json;
use crate::state::AppState;

/// Body of `POST /v1/settlements/finalize`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FinalizeRequest {
    #[serde(default = "first_version")]
    pub settlement_version: u32,
    pub payload: SettlementPayloadInput,
    #[serde(default)]
    pub evidence_refs: Option<Vec<EvidenceRefInput>>,
}

fn first_version() -> u32 {
    1
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/settlements",
            post(create_settlement).put(upsert_settlement),
        )
        .route("/v1/settlements/finalize", post(finalize_settlement))
        .route("/v1/settlements/{order_id}", get(get_latest_settlement))
        .route("/v1/settlements/{order_id}/final", get(get_final_settlement))
}

async fn create_settlement(
    State(state): State<AppState>,
    body: Result<Json<FreightSettlementInput>, JsonRejection>,
) -> Result<(StatusCode, Json<FreightSettlementRecord>), AppError> {
    let input = extract_json(body)?;
    let record = state.stores.settlements.create(input).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn upsert_settlement(
    State(state): State<AppState>,
    body: Result<Json<FreightSettlementInput>, JsonRejection>,
) -> Result<Json<FreightSettlementRecord>, AppError> {
    let input = extract_json(body)?;
    Ok(Json(state.stores.settlements.upsert(input).await?))
}

async fn finalize_settlement(
    State(state): State<AppState>,
    body: Result<Json<FinalizeRequest>, JsonRejection>,
) -> Result<Json<FreightSettlementRecord>, AppError> {
    let req = extract_json(body)?;
    let record = state
        .stores
        .settlements
        .finalize(req.settlement_version, &req.payload, req.evidence_refs)
        .await?;
    Ok(Json(record))
}

async fn get_latest_settlement(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<FreightSettlementRecord>, AppError> {
    state
        .stores
        .settlements
        .get_latest_by_order_id(&order_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no freight settlement for order {order_id}")))
}

async fn get_final_settlement(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<FreightSettlementRecord>, AppError> {
    state
        .stores
        .settlements
        .get_latest_final_by_order_id(&order_id)
        .await?
        .map(Json)
        .ok_or_else(|| {
            AppError::NotFound(format!("no FINAL freight settlement for order {order_id}"))
        })
}
