//! Provider abstraction shared by the wire-format implementations.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;

use super::anthropic::AnthropicProvider;
use super::config::{ModelConfig, ProviderKind};
use super::openai::OpenAiProvider;
use crate::actions::ToolCatalog;

/// Model client errors.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("API error ({status}): {body}")]
    ApiError { status: u16, body: String },
    #[error("Provider error: {0}")]
    ProviderError(String),
    #[error("Failed to parse response: {0}")]
    ParseError(String),
    #[error("Max retries exceeded after {0} attempts: {1}")]
    MaxRetriesExceeded(u32, String),
}

impl ModelError {
    /// Network errors, rate limits, and server errors are retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            ModelError::RequestFailed(_) => true,
            ModelError::ApiError { status, body } => {
                *status == 429
                    || *status >= 500
                    || body.to_lowercase().contains("rate limit")
                    || body.to_lowercase().contains("overloaded")
            }
            ModelError::ProviderError(msg) => {
                let msg = msg.to_lowercase();
                msg.contains("overloaded") || msg.contains("rate limit")
            }
            ModelError::ParseError(_) => false,
            ModelError::MaxRetriesExceeded(_, _) => false,
        }
    }
}

/// Image attached to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInput {
    pub mime: String,
    pub base64: String,
}

/// Provider-neutral single-turn request.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub system: String,
    pub user: String,
    pub image: Option<ImageInput>,
    /// Tools offered; `None` or empty sends no tool schema.
    pub tools: Option<ToolCatalog>,
    /// Overrides the configured model name.
    pub model: Option<String>,
}

/// A structured call as sent by the provider, before catalog validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawToolCall {
    pub id: String,
    pub name: String,
    /// JSON-encoded arguments.
    pub arguments: String,
}

/// Normalized provider reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderReply {
    pub content: String,
    /// Provider-reported reasoning (`reasoning_content`, `thinking` blocks).
    pub reasoning: Option<String>,
    pub tool_calls: Vec<RawToolCall>,
}

/// A language-model endpoint.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Identifier used in logs.
    fn name(&self) -> &str;

    /// Send one request and normalize the reply. No retries.
    async fn complete(&self, request: &ChatRequest) -> Result<ProviderReply, ModelError>;
}

/// Build the provider selected by `config`.
pub fn build_provider(config: &ModelConfig) -> Arc<dyn LlmProvider> {
    match config.provider {
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(config.clone())),
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(config.clone())),
    }
}

pub(crate) fn http_client(config: &ModelConfig) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "falling back to default HTTP client");
            Client::new()
        })
}

/// Copy of a request body with inline image payloads replaced, for logging.
pub(crate) fn redact_images(body: &Value) -> Value {
    match body {
        Value::String(s) if s.starts_with("data:") && s.contains(";base64,") => {
            Value::String(format!("<image data url, {} bytes>", s.len()))
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    let v = match (k.as_str(), v) {
                        ("data", Value::String(s)) if s.len() > 256 => {
                            Value::String(format!("<base64, {} bytes>", s.len()))
                        }
                        _ => redact_images(v),
                    };
                    (k.clone(), v)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_images).collect()),
        other => other.clone(),
    }
}

/// Read the response, mapping non-2xx statuses to [`ModelError::ApiError`].
pub(crate) async fn read_json(response: reqwest::Response) -> Result<Value, ModelError> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(ModelError::ApiError {
            status: status.as_u16(),
            body: text,
        });
    }
    serde_json::from_str(&text).map_err(|e| ModelError::ParseError(e.to_string()))
}
