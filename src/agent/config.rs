//! Agent loop configuration.

use std::path::PathBuf;

use crate::model::RenderOptions;

/// Default hard cap on loop iterations.
pub const DEFAULT_MAX_STEPS: u32 = 20;

/// Default consecutive-failure cap.
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 3;

/// Configuration for the [`Orchestrator`](super::Orchestrator).
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Hard cap on loop iterations.
    pub max_steps: u32,
    /// Back-to-back failed iterations that end the task.
    pub max_consecutive_failures: u32,
    /// UI settle delay between iterations.
    pub step_delay_ms: u64,
    /// Settle delay after the pre-loop app launch.
    pub app_launch_settle_ms: u64,
    /// Steps rendered into each decision prompt.
    pub history_window: usize,
    /// Elements rendered before truncation.
    pub max_rendered_elements: usize,
    /// Attach the screenshot to decision requests.
    pub vision_mode: bool,
    /// Offer the `describe_screen` tool.
    pub describe_tool: bool,
    /// Language for prompts and messages, "cn" or "en".
    pub lang: String,
    /// Replaces the built-in device-loop system prompt.
    pub system_prompt: Option<String>,
    /// Directory receiving one JSONL transcript per task.
    pub transcript_dir: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
            step_delay_ms: 1000,
            app_launch_settle_ms: 2000,
            history_window: 8,
            max_rendered_elements: 80,
            vision_mode: false,
            describe_tool: true,
            lang: "cn".to_string(),
            system_prompt: None,
            transcript_dir: None,
        }
    }
}

impl AgentConfig {
    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_max_consecutive_failures(mut self, max: u32) -> Self {
        self.max_consecutive_failures = max;
        self
    }

    pub fn with_step_delay(mut self, ms: u64) -> Self {
        self.step_delay_ms = ms;
        self
    }

    pub fn with_app_launch_settle(mut self, ms: u64) -> Self {
        self.app_launch_settle_ms = ms;
        self
    }

    pub fn with_history_window(mut self, steps: usize) -> Self {
        self.history_window = steps;
        self
    }

    pub fn with_max_rendered_elements(mut self, max: usize) -> Self {
        self.max_rendered_elements = max;
        self
    }

    pub fn with_vision_mode(mut self, enabled: bool) -> Self {
        self.vision_mode = enabled;
        self
    }

    pub fn with_describe_tool(mut self, enabled: bool) -> Self {
        self.describe_tool = enabled;
        self
    }

    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = lang.into();
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_transcript_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.transcript_dir = Some(dir.into());
        self
    }

    /// Prompt rendering bounds derived from this configuration.
    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            max_elements: self.max_rendered_elements,
            history_window: self.history_window,
            attach_screenshot: self.vision_mode,
            lang: self.lang.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.max_steps, 20);
        assert_eq!(config.max_consecutive_failures, 3);
        assert!(config.describe_tool);
    }

    #[test]
    fn test_render_options_follow_config() {
        let render = AgentConfig::default()
            .with_vision_mode(true)
            .with_history_window(3)
            .with_lang("en")
            .render_options();
        assert!(render.attach_screenshot);
        assert_eq!(render.history_window, 3);
        assert_eq!(render.lang, "en");
    }
}
