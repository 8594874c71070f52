use crate::dtos::LogEntryResponse;
use crate::middleware::DbSession;
use axum::Json;
use service_core::error::AppError;

/// `GET /logs`: the ten most recent questions, newest first.
pub async fn recent_logs(mut session: DbSession) -> Result<Json<Vec<LogEntryResponse>>, AppError> {
    let entries = session.recent_questions().await?;

    Ok(Json(entries.into_iter().map(LogEntryResponse::from).collect()))
}
