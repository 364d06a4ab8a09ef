//! /metrics handler: Prometheus text exposition.

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;

use surge_pool::metrics::TEXT_FORMAT;

use super::ApiState;

pub async fn handle_metrics(
    State(state): State<ApiState>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let body = state.metrics.render().map_err(|e| {
        tracing::warn!(error = %e, "failed to render metrics");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    Ok(([(header::CONTENT_TYPE, TEXT_FORMAT)], body))
}
