use crate::services::database;
use crate::startup::AppState;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::error::AppError;
use std::ops::{Deref, DerefMut};

/// Per-request question-log session.
///
/// As an extractor it is acquired before the handler body runs; handlers that
/// only need it late call [`DbSession::open`] instead. Either way the
/// connection goes back to the pool when the handler returns. Without a
/// configured store opening fails with 503.
pub struct DbSession(pub database::DbSession);

impl DbSession {
    pub async fn open(state: &AppState) -> Result<Self, AppError> {
        let log = state.question_log.as_ref().ok_or_else(|| {
            tracing::error!("Question log requested but no database is configured");
            AppError::ServiceUnavailable
        })?;

        Ok(DbSession(log.session().await?))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for DbSession {
    type Rejection = AppError;

    async fn from_request_parts(
        _parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Self::open(state).await
    }
}

impl Deref for DbSession {
    type Target = database::DbSession;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for DbSession {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}
