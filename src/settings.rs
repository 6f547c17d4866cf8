//! Layered settings for the CLI: defaults, then the JSON file in the platform
//! config directory, then environment variables (including a `.env` file).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::adb::AdbBackendConfig;
use crate::agent::AgentConfig;
use crate::model::{
    ModelConfig, ProviderKind, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY_SECS, DEFAULT_TIMEOUT_SECS,
};

/// Settings errors.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Cannot determine config directory")]
    NoConfigDir,
    #[error("Settings I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid settings file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: String, value: String },
}

/// Application settings that can be saved and loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// "openai" or "anthropic".
    pub provider: String,
    /// Empty means the provider's default endpoint.
    pub base_url: String,
    pub api_key: String,
    pub model_name: String,
    /// Model for the vision pass; empty reuses `model_name`.
    pub vision_model_name: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// Retry delay in seconds
    pub retry_delay: u64,
    pub adb_path: String,
    /// ADB device ID (optional)
    pub device_id: String,
    /// Language code ("cn" or "en")
    pub lang: String,
    pub max_steps: u32,
    pub max_consecutive_failures: u32,
    pub step_delay_ms: u64,
    /// Attach screenshots to every decision.
    pub vision_mode: bool,
    /// Offer the on-demand describe_screen tool.
    pub describe_tool: bool,
    /// JSONL transcript directory; empty disables transcripts.
    pub transcript_dir: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        let model = ModelConfig::default();
        let agent = AgentConfig::default();
        Self {
            provider: ProviderKind::default().to_string(),
            base_url: String::new(),
            api_key: "EMPTY".to_string(),
            model_name: model.model_name,
            vision_model_name: String::new(),
            max_tokens: model.max_tokens,
            temperature: model.temperature,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY_SECS,
            adb_path: "adb".to_string(),
            device_id: String::new(),
            lang: agent.lang,
            max_steps: agent.max_steps,
            max_consecutive_failures: agent.max_consecutive_failures,
            step_delay_ms: agent.step_delay_ms,
            vision_mode: agent.vision_mode,
            describe_tool: agent.describe_tool,
            transcript_dir: String::new(),
        }
    }
}

impl AppSettings {
    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "moderras", "phone-pilot")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the settings file path.
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("settings.json"))
    }

    /// Default transcript location under the platform data directory.
    pub fn default_transcript_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "moderras", "phone-pilot")
            .map(|dirs| dirs.data_dir().join("transcripts"))
    }

    /// Defaults, overlaid with the settings file and then the environment.
    pub fn resolve() -> Result<Self, SettingsError> {
        // A missing .env file is fine.
        let _ = dotenvy::dotenv();
        Self::load().apply_env(|key| std::env::var(key).ok())
    }

    /// Load settings from the config file, falling back to defaults.
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        Self::load_from(&path).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable settings file");
            Self::default()
        })
    }

    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save settings to the config file.
    pub fn save(&self) -> Result<PathBuf, SettingsError> {
        let path = Self::settings_path().ok_or(SettingsError::NoConfigDir)?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Override fields from environment-style variables.
    pub fn apply_env(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, SettingsError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("MODEL_PROVIDER") {
            self.provider = v;
        }
        if let Some(v) = get("MODEL_BASE_URL") {
            self.base_url = v;
        }
        if let Some(v) = get("MODEL_API_KEY") {
            self.api_key = v;
        }
        if let Some(v) = get("MODEL_NAME") {
            self.model_name = v;
        }
        if let Some(v) = get("VISION_MODEL_NAME") {
            self.vision_model_name = v;
        }
        if let Some(v) = get("MODEL_MAX_TOKENS") {
            self.max_tokens = parse_value("MODEL_MAX_TOKENS", &v)?;
        }
        if let Some(v) = get("MODEL_TEMPERATURE") {
            self.temperature = parse_value("MODEL_TEMPERATURE", &v)?;
        }
        if let Some(v) = get("MODEL_TIMEOUT") {
            self.timeout_secs = parse_value("MODEL_TIMEOUT", &v)?;
        }
        if let Some(v) = get("MODEL_MAX_RETRIES") {
            self.max_retries = parse_value("MODEL_MAX_RETRIES", &v)?;
        }
        if let Some(v) = get("MODEL_RETRY_DELAY") {
            self.retry_delay = parse_value("MODEL_RETRY_DELAY", &v)?;
        }
        if let Some(v) = get("ADB_PATH") {
            self.adb_path = v;
        }
        if let Some(v) = get("ADB_DEVICE_ID") {
            self.device_id = v;
        }
        if let Some(v) = get("AGENT_LANG") {
            self.lang = v;
        }
        if let Some(v) = get("AGENT_MAX_STEPS") {
            self.max_steps = parse_value("AGENT_MAX_STEPS", &v)?;
        }
        if let Some(v) = get("AGENT_MAX_FAILURES") {
            self.max_consecutive_failures = parse_value("AGENT_MAX_FAILURES", &v)?;
        }
        if let Some(v) = get("AGENT_STEP_DELAY_MS") {
            self.step_delay_ms = parse_value("AGENT_STEP_DELAY_MS", &v)?;
        }
        if let Some(v) = get("AGENT_VISION_MODE") {
            self.vision_mode = parse_flag("AGENT_VISION_MODE", &v)?;
        }
        if let Some(v) = get("AGENT_DESCRIBE_TOOL") {
            self.describe_tool = parse_flag("AGENT_DESCRIBE_TOOL", &v)?;
        }
        if let Some(v) = get("AGENT_TRANSCRIPT_DIR") {
            self.transcript_dir = v;
        }
        Ok(self)
    }

    pub fn provider_kind(&self) -> Result<ProviderKind, SettingsError> {
        self.provider.parse().map_err(|_| SettingsError::Invalid {
            key: "provider".to_string(),
            value: self.provider.clone(),
        })
    }

    pub fn to_model_config(&self) -> Result<ModelConfig, SettingsError> {
        let mut config = ModelConfig::default()
            .with_provider(self.provider_kind()?)
            .with_api_key(&self.api_key)
            .with_model_name(&self.model_name)
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature)
            .with_timeout(self.timeout_secs)
            .with_max_retries(self.max_retries)
            .with_retry_delay(self.retry_delay);
        if !self.base_url.trim().is_empty() {
            config = config.with_base_url(self.base_url.trim());
        }
        if !self.vision_model_name.trim().is_empty() {
            config = config.with_vision_model(self.vision_model_name.trim());
        }
        Ok(config)
    }

    pub fn to_agent_config(&self) -> AgentConfig {
        let mut config = AgentConfig::default()
            .with_lang(&self.lang)
            .with_max_steps(self.max_steps)
            .with_max_consecutive_failures(self.max_consecutive_failures)
            .with_step_delay(self.step_delay_ms)
            .with_vision_mode(self.vision_mode)
            .with_describe_tool(self.describe_tool);
        if !self.transcript_dir.trim().is_empty() {
            config = config.with_transcript_dir(self.transcript_dir.trim());
        }
        config
    }

    pub fn adb_config(&self) -> AdbBackendConfig {
        let mut config = AdbBackendConfig::default().with_adb_path(&self.adb_path);
        if !self.device_id.trim().is_empty() {
            config = config.with_device_id(self.device_id.trim());
        }
        config
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, SettingsError> {
    value.trim().parse().map_err(|_| SettingsError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_flag(key: &str, value: &str) -> Result<bool, SettingsError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(SettingsError::Invalid {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_match_core_defaults() {
        let settings = AppSettings::default();
        let agent = settings.to_agent_config();
        assert_eq!(agent.max_steps, 20);
        assert_eq!(agent.max_consecutive_failures, 3);
        assert!(agent.transcript_dir.is_none());

        let model = settings.to_model_config().unwrap();
        assert_eq!(model.provider, ProviderKind::OpenAi);
        assert_eq!(model.base_url, ProviderKind::OpenAi.default_base_url());
    }

    #[test]
    fn test_environment_overrides() {
        let settings = AppSettings::default()
            .apply_env(env(&[
                ("MODEL_PROVIDER", "claude"),
                ("MODEL_NAME", "claude-sonnet-4-5"),
                ("AGENT_MAX_STEPS", "12"),
                ("AGENT_VISION_MODE", "true"),
                ("ADB_DEVICE_ID", "emulator-5554"),
                ("MODEL_API_KEY", "  "),
            ]))
            .unwrap();

        let model = settings.to_model_config().unwrap();
        assert_eq!(model.provider, ProviderKind::Anthropic);
        assert_eq!(model.base_url, "https://api.anthropic.com");
        assert_eq!(model.model_name, "claude-sonnet-4-5");
        assert_eq!(model.api_key, "EMPTY");

        let agent = settings.to_agent_config();
        assert_eq!(agent.max_steps, 12);
        assert!(agent.vision_mode);
        assert_eq!(
            settings.adb_config().device_id.as_deref(),
            Some("emulator-5554")
        );
    }

    #[test]
    fn test_invalid_values_are_reported() {
        let err = AppSettings::default()
            .apply_env(env(&[("AGENT_MAX_STEPS", "many")]))
            .unwrap_err();
        assert!(matches!(err, SettingsError::Invalid { ref key, .. } if key == "AGENT_MAX_STEPS"));

        let settings = AppSettings {
            provider: "gemini".to_string(),
            ..AppSettings::default()
        };
        assert!(settings.to_model_config().is_err());
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = AppSettings {
            lang: "en".to_string(),
            transcript_dir: "/tmp/transcripts".to_string(),
            ..AppSettings::default()
        };
        settings.save_to(&path).unwrap();
        assert_eq!(AppSettings::load_from(&path).unwrap(), settings);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"lang":"en"}"#).unwrap();
        let loaded = AppSettings::load_from(&path).unwrap();
        assert_eq!(loaded.lang, "en");
        assert_eq!(loaded.max_steps, 20);
    }
}
