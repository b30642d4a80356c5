use crate::services::get_metrics;
use crate::startup::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use service_core::error::AppError;

/// Plain acknowledgment on the service root.
pub async fn liveness() -> &'static str {
    "Server is running!"
}

/// Health check endpoint for Docker/K8s liveness probes.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": state.config.service_name,
        "version": state.config.service_version
    }))
}

/// Ready once the scratch directory for uploads is usable.
pub async fn readiness_check(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    let scratch_dir = &state.config.upload.scratch_dir;
    match tokio::fs::metadata(scratch_dir).await {
        Ok(meta) if meta.is_dir() => {
            tracing::debug!("Readiness check passed");
            Ok(StatusCode::OK)
        }
        Ok(_) => {
            tracing::warn!(scratch_dir = %scratch_dir.display(), "Scratch path is not a directory");
            Err(AppError::ServiceUnavailable)
        }
        Err(e) => {
            tracing::warn!(error = %e, scratch_dir = %scratch_dir.display(), "Readiness check failed");
            Err(AppError::ServiceUnavailable)
        }
    }
}

/// Metrics endpoint for Prometheus scraping.
pub async fn metrics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}
