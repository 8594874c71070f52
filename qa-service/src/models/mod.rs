pub mod log_entry;

pub use log_entry::{LogEntry, MAX_QUESTION_CHARS};
