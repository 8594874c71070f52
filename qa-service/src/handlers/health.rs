use crate::services::get_metrics;
use crate::startup::AppState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let service = state.config.service_name.clone();
    let mode = state.config.mode.as_str();

    if let Some(log) = &state.question_log {
        if let Err(e) = log.health_check().await {
            tracing::error!(error = %e, "Database health check failed");
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "service": service,
                    "mode": mode,
                    "error": e.to_string()
                })),
            );
        }
    }

    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": service,
            "version": env!("CARGO_PKG_VERSION"),
            "mode": mode
        })),
    )
}

pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    if state.answer_generator.provider().health_check().await.is_err() {
        return StatusCode::SERVICE_UNAVAILABLE;
    }

    match &state.question_log {
        Some(log) if log.health_check().await.is_err() => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    }
}

pub async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        get_metrics(),
    )
}
