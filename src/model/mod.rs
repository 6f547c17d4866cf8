//! Decision client and language-model providers.

mod anthropic;
mod client;
mod config;
mod openai;
mod provider;
mod render;


pub use anthropic::AnthropicProvider;
pub use client::{normalize_reply, split_reasoning, DecisionClient, DecisionInput, DecisionResult};
pub use config::{
    ModelConfig, ProviderKind, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY_SECS, DEFAULT_TIMEOUT_SECS,
};
pub use openai::OpenAiProvider;
pub use provider::{
    build_provider, ChatRequest, ImageInput, LlmProvider, ModelError, ProviderReply, RawToolCall,
};
pub use render::{
    render_chat_prompt, render_elements, render_history, render_user_prompt, RenderOptions,
};
