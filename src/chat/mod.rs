//! Completion contract and the provider clients behind it.

pub mod anthropic;
pub mod openai;

use async_trait::async_trait;

use crate::error::Result;

pub use anthropic::AnthropicChat;
pub use openai::OpenAiChat;

const SERVICE: &str = "chat";

/// Sampling knobs shared by every provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChatSettings {
    /// Sampling temperature; 0 keeps answers reproducible.
    pub temperature: f32,
    /// Upper bound on generated tokens.
    pub max_tokens: usize,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: 1024,
        }
    }
}

/// Text completion backend.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model identity, for logs.
    fn model_id(&self) -> &str;

    /// Sends `prompt` as a single user turn and returns the reply text.
    async fn complete(&self, prompt: &str) -> Result<String>;
}
