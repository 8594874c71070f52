use crate::models::LogEntry;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Body of `POST /ask`. `pergunta` is accepted for older clients.
#[derive(Debug, Deserialize, Validate)]
pub struct AskRequest {
    #[serde(alias = "pergunta")]
    #[validate(length(max = 500, message = "question must be at most 500 characters"))]
    pub question: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogEntryResponse {
    pub id: i32,
    pub question: String,
}

impl From<LogEntry> for LogEntryResponse {
    fn from(entry: LogEntry) -> Self {
        Self {
            id: entry.id,
            question: entry.question,
        }
    }
}
