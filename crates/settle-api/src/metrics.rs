//! # Prometheus Metrics
//!
//! Domain counters recorded through the `metrics` facade and rendered by
//! the `metrics-exporter-prometheus` recorder on `GET /metrics`.
//!
//! - `settle_verifications_total{status, failure_class}`
//! - `settle_write_once_violations_total{field}`
//! - `settle_http_requests_total{method, status}`
//!
//! Without an installed recorder every call is a no-op.

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use metrics::counter;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use settle_verify::IntegrityVerificationResult;

/// Install the process-wide recorder. Call once at startup.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    tracing::info!("Prometheus recorder installed");
    Ok(handle)
}

pub fn record_verification(result: &IntegrityVerificationResult) {
    let status = if result.is_pass() { "PASS" } else { "FAIL" };
    let failure_class = result.failure_class.as_ref().map_or("NONE", |c| c.as_str());
    counter!(
        "settle_verifications_total",
        "status" => status,
        "failure_class" => failure_class
    )
    .increment(1);
}

pub fn record_write_once_violation(field: &str) {
    counter!("settle_write_once_violations_total", "field" => field.to_string()).increment(1);
}

/// Count every response by method and status code.
pub async fn track_requests(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let response = next.run(request).await;
    counter!(
        "settle_http_requests_total",
        "method" => method,
        "status" => response.status().as_u16().to_string()
    )
    .increment(1);
    response
}
