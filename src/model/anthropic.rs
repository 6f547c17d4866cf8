//! Anthropic Messages API provider.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Map, Value};

use super::config::ModelConfig;
use super::provider::{
    http_client, read_json, redact_images, ChatRequest, LlmProvider, ModelError, ProviderReply,
    RawToolCall,
};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Provider speaking the content-block shape: calls arrive as `tool_use`
/// blocks whose `input` is already a JSON object.
pub struct AnthropicProvider {
    config: ModelConfig,
    client: Client,
}

impl AnthropicProvider {
    pub fn new(config: ModelConfig) -> Self {
        let client = http_client(&config);
        Self { config, client }
    }

    fn build_body(&self, request: &ChatRequest) -> Value {
        let mut content = Vec::new();
        if let Some(image) = &request.image {
            content.push(json!({
                "type": "image",
                "source": {
                    "type": "base64",
                    "media_type": image.mime,
                    "data": image.base64,
                }
            }));
        }
        content.push(json!({"type": "text", "text": request.user}));

        let mut body = json!({
            "model": request.model.as_deref().unwrap_or(&self.config.model_name),
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "messages": [{"role": "user", "content": content}],
        });

        if !request.system.is_empty() {
            body["system"] = Value::String(request.system.clone());
        }

        if let Some(tools) = request.tools.as_ref().filter(|t| !t.tools().is_empty()) {
            body["tools"] = Value::Array(tools.to_anthropic_tools());
        }

        if let Value::Object(ref mut map) = body {
            for (key, value) in &self.config.extra_body {
                map.insert(key.clone(), value.clone());
            }
        }
        body
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ProviderReply, ModelError> {
        let url = format!("{}/v1/messages", self.config.endpoint_base());
        let body = self.build_body(request);

        tracing::debug!(
            provider = "anthropic",
            body = %redact_images(&body),
            "sending messages request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let json = read_json(response).await?;
        tracing::debug!(provider = "anthropic", response = %json, "messages response");
        parse_response(&json)
    }
}

/// Normalize a Messages API body.
pub(crate) fn parse_response(json: &Value) -> Result<ProviderReply, ModelError> {
    if json.get("type").and_then(Value::as_str) == Some("error") {
        let message = json
            .pointer("/error/message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| json.to_string());
        return Err(ModelError::ProviderError(message));
    }

    let blocks = json
        .get("content")
        .and_then(Value::as_array)
        .ok_or_else(|| ModelError::ParseError("No content blocks in response".to_string()))?;

    let mut reply = ProviderReply::default();
    let mut thinking = Vec::new();

    for block in blocks {
        match block.get("type").and_then(Value::as_str) {
            Some("text") => {
                if let Some(text) = block.get("text").and_then(Value::as_str) {
                    if !reply.content.is_empty() {
                        reply.content.push('\n');
                    }
                    reply.content.push_str(text);
                }
            }
            Some("thinking") => {
                if let Some(text) = block.get("thinking").and_then(Value::as_str) {
                    thinking.push(text.trim().to_string());
                }
            }
            Some("tool_use") => {
                let Some(name) = block.get("name").and_then(Value::as_str) else {
                    continue;
                };
                let input = block
                    .get("input")
                    .cloned()
                    .unwrap_or(Value::Object(Map::new()));
                reply.tool_calls.push(RawToolCall {
                    id: block
                        .get("id")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    name: name.to_string(),
                    arguments: input.to_string(),
                });
            }
            _ => {}
        }
    }

    thinking.retain(|t| !t.is_empty());
    if !thinking.is_empty() {
        reply.reasoning = Some(thinking.join("\n"));
    }
    Ok(reply)
}
