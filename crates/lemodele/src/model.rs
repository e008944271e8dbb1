//! The `LanguageModel` contract

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{LlmError, Result};

/// One completion call: a system instruction plus a user prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// System instruction (role, rules, output format)
    pub system: String,

    /// User-facing prompt (context and question)
    pub prompt: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Ask the provider for a JSON object response
    #[serde(default)]
    pub json_mode: bool,
}

impl CompletionRequest {
    /// Create a request with temperature 0
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            temperature: 0.0,
            json_mode: false,
        }
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Request a JSON object response
    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }
}

/// Text generation collaborator: prompt in, text out.
///
/// Implementations may fail transiently; they own any retry policy.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Complete one request
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;

    /// Model identifier used in logs and metadata
    fn model_name(&self) -> &str;
}

#[async_trait]
impl<T: LanguageModel + ?Sized> LanguageModel for std::sync::Arc<T> {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        (**self).complete(request).await
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

/// Run one completion under an independent timeout.
///
/// Elapsed budgets surface as [`LlmError::Timeout`].
pub async fn complete_within(
    model: &dyn LanguageModel,
    request: &CompletionRequest,
    budget: Duration,
) -> Result<String> {
    match tokio::time::timeout(budget, model.complete(request)).await {
        Ok(result) => result,
        Err(_) => {
            tracing::error!(model = model.model_name(), budget_ms = budget.as_millis() as u64, "model call timed out");
            Err(LlmError::Timeout { after: budget })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowModel;

    #[async_trait]
    impl LanguageModel for SlowModel {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("late".to_string())
        }

        fn model_name(&self) -> &str {
            "slow"
        }
    }

    struct EchoModel;

    #[async_trait]
    impl LanguageModel for EchoModel {
        async fn complete(&self, request: &CompletionRequest) -> Result<String> {
            Ok(request.prompt.clone())
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_budget_is_a_timeout_error() {
        let request = CompletionRequest::new("sys", "hello");
        let err = complete_within(&SlowModel, &request, Duration::from_millis(50))
            .await
            .expect_err("must time out");
        assert!(matches!(err, LlmError::Timeout { .. }));
    }

    #[tokio::test]
    async fn fast_calls_pass_through() {
        let request = CompletionRequest::new("sys", "hello").with_temperature(0.3);
        let text = complete_within(&EchoModel, &request, Duration::from_secs(1))
            .await
            .expect("completion");
        assert_eq!(text, "hello");
    }

    #[test]
    fn builder_sets_flags() {
        let request = CompletionRequest::new("a", "b").with_temperature(0.7).json();
        assert!(request.json_mode);
        assert!((request.temperature - 0.7).abs() < f32::EPSILON);
    }
}
