//! Text-completion service used to synthesize search queries.
//!
//! The service is a black box: it takes a system instruction plus user text
//! and returns plain text. The default client speaks the OpenAI-compatible
//! `/chat/completions` protocol, which Gemini also exposes.

use crate::error::{status_error, PaperflowError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Default OpenAI-compatible endpoint (Gemini)
pub const DEFAULT_LLM_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// Default model name
pub const DEFAULT_LLM_MODEL: &str = "gemini-2.5-flash";

/// Request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// A service that turns (instruction, text) into text.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, system_instruction: &str, user_text: &str) -> Result<String>;
    fn model_name(&self) -> &str;
}

/// LLM configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LLM_BASE_URL.to_string(),
            api_key: None,
            model: DEFAULT_LLM_MODEL.to_string(),
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }
}

/// OpenAI-compatible API response structures
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Completion client for any OpenAI-compatible chat endpoint.
pub struct OpenAiCompatibleClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl OpenAiCompatibleClient {
    /// Build the client. Fails fast when no API key is configured.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| PaperflowError::missing_credential("LLM_API_KEY"))?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PaperflowError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_url: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl CompletionService for OpenAiCompatibleClient {
    async fn complete(&self, system_instruction: &str, user_text: &str) -> Result<String> {
        let request_body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system_instruction},
                {"role": "user", "content": user_text}
            ],
            "temperature": 0.2
        });

        debug!(model = %self.model, "Sending completion request");

        let response = self
            .client
            .post(&self.api_url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(status_error(status, &error_text));
        }

        let api_response: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| PaperflowError::Parse(format!("Failed to parse completion response: {}", e)))?;

        Ok(api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
