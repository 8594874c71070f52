//! Question log entry.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Width of the `question_logs.question` column, in characters.
pub const MAX_QUESTION_CHARS: u64 = 500;

/// One persisted question. Rows are only ever inserted.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: i32,
    pub question: String,
}
