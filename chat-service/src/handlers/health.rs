use crate::startup::AppState;
use crate::services::metrics;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use service_core::error::AppError;

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "chat-service",
        "version": env!("CARGO_PKG_VERSION"),
        "model": state.model.mode(),
    }))
}

/// Readiness probe. Fails only when a configured model cannot be reached.
pub async fn readiness_check(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    state.model.health_check().await.map_err(|e| {
        tracing::warn!(error = %e, "Model provider not ready");
        AppError::ServiceUnavailable
    })?;
    Ok(StatusCode::OK)
}

/// Prometheus text exposition.
pub async fn metrics_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::get_metrics(),
    )
}
