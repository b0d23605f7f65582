//! LLM client module
//!
//! Streaming chat against either an OpenAI-compatible endpoint (OpenAI,
//! LM Studio, llama.cpp, Ollama's `/v1`) or Ollama's native `/api/chat`.

pub mod chat;
pub mod client;
pub mod stream;

pub use chat::{ChatMessage, ChatRequest, MessageRole, StreamEvent, TokenUsage};
pub use client::{LlmClient, LlmProvider};

use crate::error::ShellwiseError;
use futures::Stream;
use std::pin::Pin;
use std::time::Duration;

/// Ordered stream of response fragments; ends after `Done`, on error, or when the provider closes.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, ShellwiseError>> + Send>>;

/// Anything that can turn a message list into a stream of text fragments.
pub trait ChatTransport: Send + Sync {
    fn stream_chat(&self, request: ChatRequest) -> ChatStream;
}

/// LLM Configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    /// API endpoint base URL, without trailing slash
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    /// Maximum tokens in response
    pub max_tokens: Option<u32>,
    /// Temperature for sampling (0.0 - 2.0)
    pub temperature: Option<f32>,
    pub timeout: Duration,
}

impl LlmConfig {
    pub fn new(
        provider: LlmProvider,
        base_url: String,
        model: String,
        api_key: Option<String>,
    ) -> Self {
        LlmConfig {
            provider,
            base_url,
            model,
            api_key,
            max_tokens: None,
            temperature: None,
            timeout: Duration::from_secs(300),
        }
    }

    /// Set maximum tokens
    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    /// Set temperature
    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp.clamp(0.0, 2.0));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Fixed instruction sent ahead of every conversation.
pub fn default_system_prompt() -> String {
    String::from(
        "You are a shell assistant embedded in the user's terminal. \
        The user describes what they want to do; you suggest shell commands for their current shell.\n\n\
        Always answer with a single JSON object and nothing else:\n\
        {\"text\": \"<short explanation>\", \"commands\": [\"<command>\", ...]}\n\n\
        Rules:\n\
        - Each entry in \"commands\" must be one complete command that can run on its own.\n\
        - List commands in the order they should run.\n\
        - Multi-line payloads (heredocs, scripts) go inside a single entry with embedded newlines.\n\
        - Use an empty \"commands\" list when answering a question that needs no command.\n\
        - Prefer safe, read-only commands; mention risks in \"text\" for destructive ones.\n\
        - Nothing is executed without the user's approval, so never claim a command has run.\n\n\
        The user's message may start with a block of recent terminal output for context.",
    )
}
