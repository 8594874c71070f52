use crate::dtos::{AskRequest, AskResponse};
use crate::middleware::DbSession;
use crate::services::Answer;
use crate::startup::AppState;
use axum::{extract::State, Json};
use service_core::error::AppError;
use validator::Validate;

/// `POST /ask` in minimal mode.
///
/// Upstream failures never change the status code; the client gets 200 with
/// the apology as the answer.
pub async fn ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    let answer = answer_question(&state, &request.question).await;

    Ok(Json(AskResponse {
        answer: answer.into_text(),
    }))
}

/// `POST /ask` in logging mode: same contract, plus the question is stored
/// once it has been answered.
///
/// The log session is opened only after the answer comes back, so a slow
/// upstream call never holds a pooled connection.
pub async fn ask_and_record(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    request.validate()?;

    let answer = answer_question(&state, &request.question).await;

    if answer.is_generated() {
        let mut session = DbSession::open(&state).await?;
        session.record(&request.question).await?;
    }

    Ok(Json(AskResponse {
        answer: answer.into_text(),
    }))
}

async fn answer_question(state: &AppState, question: &str) -> Answer {
    let context = state.context_loader.load().await;
    state
        .answer_generator
        .generate_answer(&context, question)
        .await
}
