//! Anthropic Messages API transport.

use super::LlmError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// A single prompt sent to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// System prompt framing the request.
    pub system: String,
    /// User message body.
    pub prompt: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Upper bound for generated tokens.
    pub max_tokens: u32,
}

/// Interface implemented by completion backends.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send one request and return the model's text output.
    async fn complete(&self, api_key: &str, request: CompletionRequest)
    -> Result<String, LlmError>;
}

/// Client for the hosted Anthropic Messages API.
pub struct AnthropicClient {
    http: Client,
    base_url: String,
    model: String,
}

impl AnthropicClient {
    /// Build a client for `base_url` that requests completions from `model`.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Result<Self, LlmError> {
        let http = Client::builder()
            .user_agent(concat!("vaultscribe/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            model: model.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl CompletionClient for AnthropicClient {
    async fn complete(
        &self,
        api_key: &str,
        request: CompletionRequest,
    ) -> Result<String, LlmError> {
        if api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey);
        }

        let payload = json!({
            "model": self.model,
            "system": request.system,
            "messages": [{ "role": "user", "content": request.prompt }],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        tracing::debug!(
            model = %self.model,
            prompt_chars = request.prompt.chars().count(),
            max_tokens = request.max_tokens,
            "Sending completion request"
        );

        let response = self
            .http
            .post(self.endpoint())
            .header("x-api-key", api_key.trim())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = LlmError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Completion request rejected");
            return Err(error);
        }

        let body: MessagesResponse = response.json().await.map_err(|error| {
            LlmError::InvalidResponse(format!("failed to decode response body: {error}"))
        })?;

        body.content
            .into_iter()
            .next()
            .and_then(|block| block.text)
            .ok_or_else(|| LlmError::InvalidResponse("response contained no text block".into()))
    }
}
