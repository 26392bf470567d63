//! Chat-completion client abstraction.
//!
//! Defines the [`ChatModel`] trait and [`OpenAiChatModel`], which talks to
//! any OpenAI-compatible `POST {endpoint}/chat/completions` API (Azure AI
//! Inference, GitHub Models, OpenAI itself).
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::config::ModelConfig;
use crate::models::Message;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("failed to parse response: {0}")]
    Parse(String),
    #[error("model not configured: {0}")]
    NotConfigured(String),
}

/// Fixed decoding parameters sent with every completion request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodingConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl From<&ModelConfig> for DecodingConfig {
    fn from(config: &ModelConfig) -> Self {
        Self {
            model: config.name.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
        }
    }
}

/// A backend that turns a conversation into a single reply.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model identifier, for logs.
    fn model_name(&self) -> &str;

    /// Send the conversation and return the assistant's reply text.
    async fn complete(&self, messages: &[Message]) -> Result<String, ModelError>;
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    messages: &'a [Message],
    #[serde(flatten)]
    decoding: &'a DecodingConfig,
}

/// Client for OpenAI-compatible chat-completion endpoints.
pub struct OpenAiChatModel {
    client: reqwest::Client,
    url: String,
    api_key: String,
    decoding: DecodingConfig,
    max_retries: u32,
}

impl OpenAiChatModel {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::NotConfigured`] if the endpoint or API key is
    /// missing.
    pub fn new(config: &ModelConfig) -> Result<Self, ModelError> {
        let endpoint = config.endpoint.as_deref().ok_or_else(|| {
            ModelError::NotConfigured(format!(
                "model.endpoint or {} must be set",
                crate::config::ENDPOINT_ENV
            ))
        })?;
        let api_key = config.api_key.clone().ok_or_else(|| {
            ModelError::NotConfigured(format!("{} not set", crate::config::API_KEY_ENV))
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: completions_url(endpoint, config.api_version.as_deref()),
            api_key,
            decoding: DecodingConfig::from(config),
            max_retries: config.max_retries,
        })
    }
}

fn completions_url(endpoint: &str, api_version: Option<&str>) -> String {
    let base = format!("{}/chat/completions", endpoint.trim_end_matches('/'));
    match api_version {
        Some(v) => format!("{}?api-version={}", base, v),
        None => base,
    }
}

/// Pull `choices[0].message.content` out of a completion response.
fn parse_completion(json: &serde_json::Value) -> Result<String, ModelError> {
    json["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ModelError::Parse("missing choices[0].message.content".into()))
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    fn model_name(&self) -> &str {
        &self.decoding.model
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, ModelError> {
        let body = CompletionRequest {
            messages,
            decoding: &self.decoding,
        };

        let mut attempt = 0;

        loop {
            debug!(url = %self.url, attempt, "chat completion request");

            let resp = self
                .client
                .post(&self.url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("api-key", &self.api_key)
                .json(&body)
                .send()
                .await;

            let err = match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_completion(&json);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    let err = ModelError::Api {
                        status: status.as_u16(),
                        body: body_text,
                    };

                    // Retry rate limits and server errors only
                    if status.as_u16() != 429 && !status.is_server_error() {
                        return Err(err);
                    }
                    err
                }
                Err(e) => ModelError::Http(e),
            };

            if attempt >= self.max_retries {
                return Err(err);
            }
            attempt += 1;

            // Exponential backoff: 1s, 2s, 4s, 8s, ...
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            debug!(error = %err, delay_secs = delay.as_secs(), "retrying chat completion");
            tokio::time::sleep(delay).await;
        }
    }
}
