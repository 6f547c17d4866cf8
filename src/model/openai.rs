//! OpenAI-compatible `/chat/completions` provider.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::config::ModelConfig;
use super::provider::{
    http_client, read_json, redact_images, ChatRequest, LlmProvider, ModelError, ProviderReply,
    RawToolCall,
};

/// Provider speaking the OpenAI tool-calling shape: calls arrive in
/// `choices[0].message.tool_calls` with JSON-encoded `arguments`.
pub struct OpenAiProvider {
    config: ModelConfig,
    client: Client,
}

impl OpenAiProvider {
    pub fn new(config: ModelConfig) -> Self {
        let client = http_client(&config);
        Self { config, client }
    }

    fn build_body(&self, request: &ChatRequest) -> Value {
        let user_content = match &request.image {
            Some(image) => json!([
                {
                    "type": "image_url",
                    "image_url": {
                        "url": format!("data:{};base64,{}", image.mime, image.base64)
                    }
                },
                {"type": "text", "text": request.user}
            ]),
            None => json!(request.user),
        };

        let mut messages = Vec::new();
        if !request.system.is_empty() {
            messages.push(json!({"role": "system", "content": request.system}));
        }
        messages.push(json!({"role": "user", "content": user_content}));

        let mut body = json!({
            "model": request.model.as_deref().unwrap_or(&self.config.model_name),
            "messages": messages,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
        });

        if let Some(tools) = request.tools.as_ref().filter(|t| !t.tools().is_empty()) {
            body["tools"] = Value::Array(tools.to_openai_tools());
            body["tool_choice"] = json!("auto");
        }

        // Merge extra_body
        if let Value::Object(ref mut map) = body {
            for (key, value) in &self.config.extra_body {
                map.insert(key.clone(), value.clone());
            }
        }
        body
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ProviderReply, ModelError> {
        let url = format!("{}/chat/completions", self.config.endpoint_base());
        let body = self.build_body(request);

        tracing::debug!(
            provider = "openai",
            body = %redact_images(&body),
            "sending chat completion request"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let json = read_json(response).await?;
        tracing::debug!(provider = "openai", response = %json, "chat completion response");
        parse_response(&json)
    }
}

/// Normalize a chat completion body.
pub(crate) fn parse_response(json: &Value) -> Result<ProviderReply, ModelError> {
    if let Some(error) = json.get("error").filter(|e| !e.is_null()) {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(ModelError::ProviderError(message));
    }

    let message = json
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .ok_or_else(|| ModelError::ParseError("No choices in response".to_string()))?;

    let content = match message.get("content") {
        Some(Value::String(s)) => s.clone(),
        // Some compatible servers return content parts.
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    };

    let reasoning = message
        .get("reasoning_content")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string);

    let tool_calls = message
        .get("tool_calls")
        .and_then(Value::as_array)
        .map(|calls| calls.iter().filter_map(parse_tool_call).collect())
        .unwrap_or_default();

    Ok(ProviderReply {
        content,
        reasoning,
        tool_calls,
    })
}

fn parse_tool_call(call: &Value) -> Option<RawToolCall> {
    let function = call.get("function")?;
    let name = function.get("name")?.as_str()?.to_string();
    let arguments = match function.get("arguments") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        // Non-conforming servers sometimes send an object.
        Some(other) => other.to_string(),
    };
    Some(RawToolCall {
        id: call
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        name,
        arguments,
    })
}
