pub mod answer;
pub mod context;
pub mod database;
pub mod metrics;
pub mod providers;

pub use answer::{Answer, AnswerGenerator, APOLOGY};
pub use context::{ContextLoader, CONTEXT_FALLBACK};
pub use database::QuestionLog;
pub use metrics::{get_metrics, init_metrics};
