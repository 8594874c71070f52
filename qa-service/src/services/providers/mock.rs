//! Mock provider implementation for testing.

use super::{ProviderError, TextProvider};
use async_trait::async_trait;
use std::sync::Mutex;

/// What the mock does when asked to generate.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Reply with a fixed answer.
    Answer(String),
    /// Fail as an upstream HTTP error would.
    Fail,
    /// Fail as a malformed response envelope would.
    Malformed,
}

/// Mock text provider for testing. Remembers every prompt it receives.
pub struct MockTextProvider {
    behavior: MockBehavior,
    prompts: Mutex<Vec<String>>,
}

impl MockTextProvider {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn answering(answer: &str) -> Self {
        Self::new(MockBehavior::Answer(answer.to_string()))
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Fail)
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TextProvider for MockTextProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        match &self.behavior {
            MockBehavior::Answer(answer) => Ok(answer.clone()),
            MockBehavior::Fail => Err(ProviderError::ApiError(
                "Mock API error 500 Internal Server Error".to_string(),
            )),
            MockBehavior::Malformed => Err(ProviderError::MalformedResponse(
                "no candidates in response".to_string(),
            )),
        }
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}
