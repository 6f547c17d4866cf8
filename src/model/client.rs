//! Decision client: one model call per loop iteration, normalized into a [`DecisionResult`].

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;

use super::config::ModelConfig;
use super::provider::{build_provider, ChatRequest, ImageInput, LlmProvider, ModelError, ProviderReply};
use super::render::{render_chat_prompt, render_user_prompt, RenderOptions};
use crate::actions::{decode_tool_call, AgentAction, ToolCatalog};
use crate::agent::Step;
use crate::config::describe_screen_prompt;
use crate::perception::{ScreenState, Screenshot};

/// Normalized outcome of one decision call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionResult {
    /// A validated action, with optional reasoning.
    ToolCall(AgentAction, Option<String>),
    /// Text with no structured call.
    TextOnly(String, Option<String>),
    /// Nothing usable in the reply.
    Empty(Option<String>),
    /// Transport, provider, or validation failure.
    Error(String),
}

impl DecisionResult {
    pub fn reasoning(&self) -> Option<&str> {
        match self {
            DecisionResult::ToolCall(_, r) | DecisionResult::TextOnly(_, r) | DecisionResult::Empty(r) => {
                r.as_deref()
            }
            DecisionResult::Error(_) => None,
        }
    }
}

/// Inputs for one decision.
#[derive(Debug, Clone, Copy)]
pub struct DecisionInput<'a> {
    pub system_prompt: &'a str,
    pub task: &'a str,
    pub screen: &'a ScreenState,
    pub history: &'a [Step],
    pub tools: &'a ToolCatalog,
    /// Corrective note about the previous iteration.
    pub feedback: Option<&'a str>,
}

/// Talks to exactly one configured provider.
#[derive(Clone)]
pub struct DecisionClient {
    provider: Arc<dyn LlmProvider>,
    config: ModelConfig,
    render: RenderOptions,
}

impl DecisionClient {
    /// Create a client for the provider selected by `config`.
    pub fn new(config: ModelConfig) -> Self {
        let provider = build_provider(&config);
        Self::with_provider(provider, config)
    }

    /// Create a client around an existing provider.
    pub fn with_provider(provider: Arc<dyn LlmProvider>, config: ModelConfig) -> Self {
        Self {
            provider,
            config,
            render: RenderOptions::default(),
        }
    }

    pub fn with_render_options(mut self, render: RenderOptions) -> Self {
        self.render = render;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn render_options(&self) -> &RenderOptions {
        &self.render
    }

    /// Ask the model for the next action.
    ///
    /// Never fails: transport and validation problems become
    /// [`DecisionResult::Error`].
    pub async fn decide(&self, input: &DecisionInput<'_>) -> DecisionResult {
        let image = if self.render.attach_screenshot {
            input.screen.screenshot.as_ref().map(image_input)
        } else {
            None
        };
        let request = ChatRequest {
            system: input.system_prompt.to_string(),
            user: render_user_prompt(
                input.task,
                input.screen,
                input.history,
                input.feedback,
                &self.render,
            ),
            image,
            tools: Some(input.tools.clone()),
            model: None,
        };
        self.resolve(&request, input.tools, input.screen).await
    }

    /// One round with no screen context: the prompt carries only the task.
    pub async fn converse(
        &self,
        system_prompt: &str,
        task: &str,
        tools: &ToolCatalog,
    ) -> DecisionResult {
        let request = ChatRequest {
            system: system_prompt.to_string(),
            user: render_chat_prompt(task),
            image: None,
            tools: Some(tools.clone()),
            model: None,
        };
        self.resolve(&request, tools, &ScreenState::empty("none")).await
    }

    async fn resolve(
        &self,
        request: &ChatRequest,
        tools: &ToolCatalog,
        screen: &ScreenState,
    ) -> DecisionResult {
        let reply = match self.request(request).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(provider = self.provider.name(), error = %e, "decision request failed");
                return DecisionResult::Error(e.to_string());
            }
        };

        let result = normalize_reply(reply, tools, screen);
        match &result {
            DecisionResult::ToolCall(action, _) => {
                tracing::info!(provider = self.provider.name(), action = %action.describe(), "decision")
            }
            DecisionResult::TextOnly(text, _) => {
                tracing::info!(provider = self.provider.name(), chars = text.len(), "text-only decision")
            }
            DecisionResult::Empty(_) => {
                tracing::warn!(provider = self.provider.name(), "empty decision")
            }
            DecisionResult::Error(message) => {
                tracing::warn!(provider = self.provider.name(), error = %message, "rejected decision")
            }
        }
        result
    }

    /// Vision pass: describe `screenshot` in natural language.
    pub async fn describe_screen(
        &self,
        screenshot: &Screenshot,
        focus: Option<&str>,
    ) -> Result<String, ModelError> {
        let request = ChatRequest {
            system: String::new(),
            user: describe_screen_prompt(&self.render.lang, focus),
            image: Some(image_input(screenshot)),
            tools: None,
            model: Some(self.config.vision_model().to_string()),
        };
        let reply = self.request(&request).await?;
        let (_, text) = split_reasoning(&reply.content);
        if text.trim().is_empty() {
            return Err(ModelError::ParseError("Empty screen description".to_string()));
        }
        Ok(text.trim().to_string())
    }

    /// Send a request, retrying retryable failures with a fixed delay.
    async fn request(&self, request: &ChatRequest) -> Result<ProviderReply, ModelError> {
        let mut last_error: Option<ModelError> = None;
        let max_attempts = self.config.max_retries + 1; // +1 for the initial attempt

        for attempt in 1..=max_attempts {
            match self.provider.complete(request).await {
                Ok(reply) => return Ok(reply),
                Err(e) => {
                    if !e.is_retryable() {
                        return Err(e);
                    }
                    if attempt < max_attempts {
                        tracing::warn!(
                            provider = self.provider.name(),
                            attempt,
                            max_attempts,
                            error = %e,
                            "request failed, retrying in {}s",
                            self.config.retry_delay_secs
                        );
                        sleep(Duration::from_secs(self.config.retry_delay_secs)).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        // All retries exhausted
        Err(ModelError::MaxRetriesExceeded(
            max_attempts,
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string()),
        ))
    }
}

fn image_input(screenshot: &Screenshot) -> ImageInput {
    ImageInput {
        mime: screenshot.mime.to_string(),
        base64: screenshot.to_base64(),
    }
}

/// Map a provider reply onto a [`DecisionResult`], validating any tool call
/// against `tools`.
pub fn normalize_reply(reply: ProviderReply, tools: &ToolCatalog, screen: &ScreenState) -> DecisionResult {
    let (think, text) = split_reasoning(&reply.content);
    let text = text.trim().to_string();
    let reasoning = reply.reasoning.or(think);

    if let Some(call) = reply.tool_calls.first() {
        if reply.tool_calls.len() > 1 {
            tracing::warn!(
                count = reply.tool_calls.len(),
                "multiple tool calls in one reply, using the first"
            );
        }
        return match decode_tool_call(tools, &call.name, &call.arguments, screen) {
            Ok(action) => {
                // Text next to a call is the model explaining itself.
                let reasoning = reasoning.or((!text.is_empty()).then_some(text));
                DecisionResult::ToolCall(action, reasoning)
            }
            Err(e) => DecisionResult::Error(format!("Invalid tool call: {}", e)),
        };
    }

    if text.is_empty() {
        DecisionResult::Empty(reasoning)
    } else {
        DecisionResult::TextOnly(text, reasoning)
    }
}

/// Split `<think>` reasoning from the answer, stripping `<answer>` tags.
pub fn split_reasoning(content: &str) -> (Option<String>, String) {
    let Some(end) = content.find("</think>") else {
        let answer = content.replace("<answer>", "").replace("</answer>", "");
        return (None, answer);
    };
    let thinking = content[..end].replace("<think>", "").trim().to_string();
    let answer = content[end + "</think>".len()..]
        .replace("<answer>", "")
        .replace("</answer>", "")
        .trim()
        .to_string();
    ((!thinking.is_empty()).then_some(thinking), answer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawToolCall;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct Scripted {
        replies: Mutex<VecDeque<Result<ProviderReply, ModelError>>>,
        calls: Mutex<u32>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<ProviderReply, ModelError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(0),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _request: &ChatRequest) -> Result<ProviderReply, ModelError> {
            *self.calls.lock().unwrap() += 1;
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(ProviderReply::default()))
        }
    }

    fn call(name: &str, arguments: &str) -> ProviderReply {
        ProviderReply {
            tool_calls: vec![RawToolCall {
                id: "1".to_string(),
                name: name.to_string(),
                arguments: arguments.to_string(),
            }],
            ..ProviderReply::default()
        }
    }

    fn client(provider: Arc<Scripted>) -> DecisionClient {
        DecisionClient::with_provider(provider, ModelConfig::default().with_retry_delay(0))
    }

    async fn decide(client: &DecisionClient) -> DecisionResult {
        let screen = ScreenState::empty("com.example");
        let tools = ToolCatalog::standard();
        client
            .decide(&DecisionInput {
                system_prompt: "sys",
                task: "task",
                screen: &screen,
                history: &[],
                tools: &tools,
                feedback: None,
            })
            .await
    }

    #[test]
    fn test_split_reasoning() {
        let (thinking, answer) =
            split_reasoning("<think>I need to tap the button</think><answer>Done</answer>");
        assert_eq!(thinking.as_deref(), Some("I need to tap the button"));
        assert_eq!(answer, "Done");

        let (thinking, answer) = split_reasoning("some raw content");
        assert_eq!(thinking, None);
        assert_eq!(answer, "some raw content");
    }

    #[test]
    fn test_normalize_shapes() {
        let screen = ScreenState::empty("x");
        let tools = ToolCatalog::standard();

        assert_eq!(
            normalize_reply(call("tap", r#"{"x":1,"y":2}"#), &tools, &screen),
            DecisionResult::ToolCall(AgentAction::Tap { x: 1, y: 2 }, None)
        );
        assert!(matches!(
            normalize_reply(call("tap", r#"{"x":100}"#), &tools, &screen),
            DecisionResult::Error(_)
        ));
        assert!(matches!(
            normalize_reply(call("describe_screen", "{}"), &tools, &screen),
            DecisionResult::Error(m) if m.contains("Unknown tool")
        ));

        let text = ProviderReply {
            content: "<think>easy</think>Paris".to_string(),
            ..ProviderReply::default()
        };
        assert_eq!(
            normalize_reply(text, &tools, &screen),
            DecisionResult::TextOnly("Paris".to_string(), Some("easy".to_string()))
        );

        let blank = ProviderReply {
            content: "  \n".to_string(),
            ..ProviderReply::default()
        };
        assert_eq!(normalize_reply(blank, &tools, &screen), DecisionResult::Empty(None));
    }

    #[test]
    fn test_text_beside_call_becomes_reasoning() {
        let mut reply = call("press_key", r#"{"key":"back"}"#);
        reply.content = "Going back first.".to_string();
        let result = normalize_reply(reply, &ToolCatalog::standard(), &ScreenState::empty("x"));
        assert_eq!(result.reasoning(), Some("Going back first."));
    }

    #[tokio::test]
    async fn test_retryable_errors_are_retried() {
        let provider = Scripted::new(vec![
            Err(ModelError::ApiError {
                status: 503,
                body: "unavailable".to_string(),
            }),
            Ok(call("wait", "{}")),
        ]);
        let result = decide(&client(provider.clone())).await;
        assert!(matches!(result, DecisionResult::ToolCall(AgentAction::Wait { .. }, _)));
        assert_eq!(*provider.calls.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_error_is_a_result() {
        let provider = Scripted::new(vec![Err(ModelError::ApiError {
            status: 401,
            body: "bad key".to_string(),
        })]);
        let result = decide(&client(provider.clone())).await;
        assert!(matches!(result, DecisionResult::Error(m) if m.contains("bad key")));
        assert_eq!(*provider.calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let errors = (0..4)
            .map(|_| {
                Err(ModelError::ApiError {
                    status: 429,
                    body: String::new(),
                })
            })
            .collect();
        let provider = Scripted::new(errors);
        let result = decide(&client(provider.clone())).await;
        assert!(matches!(result, DecisionResult::Error(m) if m.contains("Max retries")));
        assert_eq!(*provider.calls.lock().unwrap(), 4);
    }
}
