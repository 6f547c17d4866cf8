//! Model provider configuration.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Default number of retry attempts for failed requests.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default delay between retry attempts in seconds.
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 2;

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Wire shape spoken by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI-compatible `/chat/completions` with `tool_calls`.
    #[default]
    OpenAi,
    /// Anthropic `/v1/messages` with content blocks.
    Anthropic,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "http://localhost:8000/v1",
            ProviderKind::Anthropic => "https://api.anthropic.com",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" | "openai-compatible" | "openai_compatible" => Ok(ProviderKind::OpenAi),
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            other => Err(format!("unknown model provider: {}", other)),
        }
    }
}

/// Configuration for the decision model.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub provider: ProviderKind,
    pub base_url: String,
    pub api_key: String,
    pub model_name: String,
    /// Model used for the vision pass; falls back to `model_name`.
    pub vision_model_name: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Extra top-level request fields (OpenAI-compatible providers only).
    pub extra_body: HashMap<String, Value>,
    pub timeout_secs: u64,
    /// Maximum number of retry attempts for failed requests.
    pub max_retries: u32,
    /// Delay between retry attempts in seconds.
    pub retry_delay_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::OpenAi,
            base_url: ProviderKind::OpenAi.default_base_url().to_string(),
            api_key: "EMPTY".to_string(),
            model_name: "gpt-4o".to_string(),
            vision_model_name: None,
            max_tokens: 3000,
            temperature: 0.0,
            extra_body: HashMap::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
        }
    }
}

impl ModelConfig {
    /// Switch provider. The base URL follows unless it was customized.
    pub fn with_provider(mut self, provider: ProviderKind) -> Self {
        if self.base_url == self.provider.default_base_url() {
            self.base_url = provider.default_base_url().to_string();
        }
        self.provider = provider;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn with_model_name(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = model_name.into();
        self
    }

    pub fn with_vision_model(mut self, model_name: impl Into<String>) -> Self {
        self.vision_model_name = Some(model_name.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Set the maximum number of retry attempts for failed requests.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the delay between retry attempts in seconds.
    pub fn with_retry_delay(mut self, delay_secs: u64) -> Self {
        self.retry_delay_secs = delay_secs;
        self
    }

    pub fn vision_model(&self) -> &str {
        self.vision_model_name.as_deref().unwrap_or(&self.model_name)
    }

    /// Base URL without a trailing slash.
    pub fn endpoint_base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_config_default() {
        let config = ModelConfig::default();
        assert_eq!(config.provider, ProviderKind::OpenAi);
        assert_eq!(config.base_url, "http://localhost:8000/v1");
        assert_eq!(config.vision_model(), "gpt-4o");
    }

    #[test]
    fn test_provider_switch_moves_default_url_only() {
        let config = ModelConfig::default().with_provider(ProviderKind::Anthropic);
        assert_eq!(config.base_url, "https://api.anthropic.com");

        let custom = ModelConfig::default()
            .with_base_url("http://proxy:9000/")
            .with_provider(ProviderKind::Anthropic);
        assert_eq!(custom.endpoint_base(), "http://proxy:9000");
    }

    #[test]
    fn test_provider_kind_parse() {
        assert_eq!("OpenAI".parse::<ProviderKind>(), Ok(ProviderKind::OpenAi));
        assert_eq!("claude".parse::<ProviderKind>(), Ok(ProviderKind::Anthropic));
        assert!("gemini".parse::<ProviderKind>().is_err());
    }
}
