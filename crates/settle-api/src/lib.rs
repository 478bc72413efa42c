//! # settle-api — HTTP Service
//!
//! Exposes the evidence stores and the integrity chain verifier over
//! Axum.
//!
//! ## API Surface
//!
//! | Route | Module |
//! |-------|--------|
//! | `/v1/manifests*` | [`routes::manifests`] |
//! | `/v1/settlements*` | [`routes::settlements`] |
//! | `/v1/integrity/verify` | [`routes::integrity`] |
//! | `/v1/canonicalize` | [`routes::canonicalize`] |
//! | `/health/liveness`, `/health/readiness` | probes |
//! | `/metrics` | Prometheus exposition |
//!
//! Request and response bodies use camelCase keys, matching the stored
//! documents. Errors are `{"error": {"code", "message", "details"}}`.
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → request counter → body limit → Handler
//! ```

pub mod config;
pub mod error;
pub mod extractors;
pub mod metrics;
pub mod routes;
pub mod state;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, StatusCode};
use axum::middleware::from_fn;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

pub use config::ApiConfig;
pub use error::AppError;
pub use state::AppState;

/// Assemble the application router.
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .merge(routes::manifests::router())
        .merge(routes::settlements::router())
        .merge(routes::integrity::router())
        .merge(routes::canonicalize::router())
        .layer(DefaultBodyLimit::max(2 * 1024 * 1024));

    Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .route("/metrics", get(prometheus_metrics))
        .merge(api)
        .layer(from_fn(metrics::track_requests))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn liveness() -> &'static str {
    "ok"
}

/// 200 "ready", or 503 when the database does not answer.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    if let Some(pool) = &state.db_pool {
        if let Err(e) = sqlx::query("SELECT 1").execute(pool).await {
            tracing::warn!("Database health check failed: {e}");
            return (StatusCode::SERVICE_UNAVAILABLE, "database unreachable").into_response();
        }
    }
    (StatusCode::OK, "ready").into_response()
}

async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}
