//! Answer generation: prompt assembly plus the upstream call, with every
//! upstream failure folded into a fixed apology.

use crate::services::metrics;
use crate::services::providers::TextProvider;
use std::sync::Arc;
use std::time::Instant;

/// Returned in place of an answer whenever the upstream call fails.
pub const APOLOGY: &str = "Desculpe, ocorreu um erro ao processar sua pergunta.";

/// Outcome of one generation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    /// Text produced by the upstream model.
    Generated(String),
    /// The upstream call failed; the client sees [`APOLOGY`].
    Apology,
}

impl Answer {
    pub fn is_generated(&self) -> bool {
        matches!(self, Answer::Generated(_))
    }

    pub fn text(&self) -> &str {
        match self {
            Answer::Generated(text) => text,
            Answer::Apology => APOLOGY,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Answer::Generated(text) => text,
            Answer::Apology => APOLOGY.to_string(),
        }
    }
}

/// Embed the context verbatim between `---` markers, followed by the literal
/// question.
pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "Baseado estritamente nas informações do programa Jovem Programador abaixo:\n\n---\n{}\n---\n\nResponda à seguinte pergunta de forma direta e concisa:\n\nPergunta: {}",
        context, question
    )
}

#[derive(Clone)]
pub struct AnswerGenerator {
    provider: Arc<dyn TextProvider>,
}

impl AnswerGenerator {
    pub fn new(provider: Arc<dyn TextProvider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &Arc<dyn TextProvider> {
        &self.provider
    }

    /// One upstream call, no retry. Never fails: errors become [`Answer::Apology`].
    pub async fn generate_answer(&self, context: &str, question: &str) -> Answer {
        let prompt = build_prompt(context, question);
        let provider = self.provider.name();
        let model = self.provider.model();

        let started = Instant::now();
        let result = self.provider.generate(&prompt).await;
        metrics::record_provider_latency(provider, model, started.elapsed().as_secs_f64());

        match result {
            Ok(text) => {
                metrics::record_question("answered");
                Answer::Generated(text)
            }
            Err(e) => {
                tracing::error!(
                    provider = provider,
                    model = model,
                    error = %e,
                    "Generative-language call failed, returning apology"
                );
                metrics::record_provider_error(provider, e.kind());
                metrics::record_question("fallback");
                Answer::Apology
            }
        }
    }
}
