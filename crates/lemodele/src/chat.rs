//! OpenAI-compatible chat completions client
//!
//! Works against any `/chat/completions` endpoint (OpenAI, Groq, Ollama's
//! compatibility layer, vLLM).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{LlmError, Result};
use crate::model::{CompletionRequest, LanguageModel};

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Default model identifier
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

/// Default environment variable holding the API key
pub const DEFAULT_API_KEY_ENV: &str = "LECAHIER_API_KEY";

/// Model backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Base URL without the `/chat/completions` suffix
    pub base_url: String,

    /// Model identifier sent to the provider
    pub model: String,

    /// Name of the environment variable that holds the API key
    pub api_key_env: String,

    /// Maximum tokens per completion
    pub max_tokens: Option<u32>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            max_tokens: None,
        }
    }
}

impl ModelConfig {
    /// Apply `LECAHIER_MODEL` / `LECAHIER_BASE_URL` overrides
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(model) = std::env::var("LECAHIER_MODEL") {
            self.model = model;
        }
        if let Ok(base_url) = std::env::var("LECAHIER_BASE_URL") {
            self.base_url = base_url;
        }
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// Chat completions client
#[derive(Clone)]
pub struct ChatCompletionsClient {
    api_key: String,
    client: reqwest::Client,
    config: ModelConfig,
}

impl std::fmt::Debug for ChatCompletionsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsClient")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .finish_non_exhaustive()
    }
}

impl ChatCompletionsClient {
    /// Create a client with an explicit API key
    pub fn new(api_key: impl Into<String>, config: ModelConfig) -> Self {
        Self {
            api_key: api_key.into(),
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Create a client reading the API key from `config.api_key_env`
    pub fn from_env(config: ModelConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            LlmError::config(format!("{} environment variable not set", config.api_key_env))
        })?;
        if api_key.trim().is_empty() {
            return Err(LlmError::config(format!("{} is empty", config.api_key_env)));
        }
        Ok(Self::new(api_key, config))
    }

    fn request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": &self.config.model,
            "messages": [
                {"role": "system", "content": &request.system},
                {"role": "user", "content": &request.prompt}
            ],
            "temperature": request.temperature,
        });

        if request.json_mode {
            body["response_format"] = serde_json::json!({"type": "json_object"});
        }
        if let Some(max_tokens) = self.config.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        body
    }
}

#[derive(Deserialize)]
struct Message {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<Choice>,
}

fn first_content(api_response: ApiResponse) -> Result<String> {
    api_response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| LlmError::malformed("provider returned no choices"))
}

#[async_trait]
impl LanguageModel for ChatCompletionsClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let response = self
            .client
            .post(self.config.endpoint())
            .bearer_auth(&self.api_key)
            .json(&self.request_body(request))
            .send()
            .await
            .map_err(|e| LlmError::transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status, model = %self.config.model, "model provider error");
            return Err(LlmError::from_status(status, body));
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::malformed(format!("failed to decode response: {e}")))?;

        let content = first_content(api_response)?;
        tracing::debug!(model = %self.config.model, chars = content.len(), "completion received");
        Ok(content)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
