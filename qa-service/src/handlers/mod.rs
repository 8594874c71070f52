//! HTTP handlers for the question-answering service.

pub mod ask;
pub mod health;
pub mod logs;

pub use ask::{ask, ask_and_record};
pub use health::{health_check, metrics, readiness_check};
pub use logs::recent_logs;
