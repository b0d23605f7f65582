//! LLM Client implementation
//!
//! Supports two wire formats:
//! - OpenAI-compatible `/chat/completions` with SSE streaming
//! - Ollama native `/api/chat` with NDJSON streaming

use super::{
    chat::{ChatMessage, ChatRequest, StreamEvent},
    stream::{parse_ollama_line, parse_openai_line, provider_error_message, SseLineBuffer},
    ChatStream, ChatTransport, LlmConfig,
};
use crate::error::ShellwiseError;
use anyhow::{Context, Result};
use futures::{Stream, StreamExt};
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client as HttpClient, Response,
};
use serde::Serialize;

/// LLM Provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    /// OpenAI-compatible API (OpenAI, LM Studio, llama.cpp, vLLM, Ollama `/v1`)
    OpenAiCompatible,
    /// Ollama native chat API
    Ollama,
}

impl std::str::FromStr for LlmProvider {
    type Err = ShellwiseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" | "lmstudio" | "local" | "openrouter" | "custom" | "llamacpp" | "vllm" => {
                Ok(LlmProvider::OpenAiCompatible)
            }
            "ollama" | "ollama-native" => Ok(LlmProvider::Ollama),
            _ => Err(ShellwiseError::UnknownProvider {
                name: s.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmProvider::OpenAiCompatible => write!(f, "OpenAI Compatible"),
            LlmProvider::Ollama => write!(f, "Ollama"),
        }
    }
}

/// Main LLM Client
pub struct LlmClient {
    config: LlmConfig,
    http_client: HttpClient,
}

impl LlmClient {
    /// Create a new LLM client
    pub fn new(config: LlmConfig) -> Result<Self> {
        let http_client = HttpClient::builder()
            .timeout(config.timeout)
            .user_agent(concat!("shellwise/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(LlmClient {
            config,
            http_client,
        })
    }

    fn openai_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
    }

    fn ollama_url(&self) -> String {
        // Accept the OpenAI-style base URL people usually paste for Ollama
        let base = self.config.base_url.trim_end_matches("/v1");
        format!("{}/api/chat", base)
    }

    /// OpenAI-compatible streaming chat
    fn stream_openai(&self, request: ChatRequest) -> ChatStream {
        let url = self.openai_url();
        let body = OpenAiRequest {
            model: self.config.model.clone(),
            messages: request.messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            stream: true,
            response_format: request.json_mode.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };
        Box::pin(stream_events(
            self.http_client.clone(),
            url,
            self.build_headers(),
            body,
            parse_openai_line,
        ))
    }

    /// Ollama native streaming chat
    fn stream_ollama(&self, request: ChatRequest) -> ChatStream {
        let url = self.ollama_url();
        let options = (self.config.temperature.is_some() || self.config.max_tokens.is_some())
            .then_some(OllamaOptions {
                temperature: self.config.temperature,
                num_predict: self.config.max_tokens,
            });
        let body = OllamaRequest {
            model: self.config.model.clone(),
            messages: request.messages,
            stream: true,
            format: request.json_mode.then_some("json"),
            options,
        };
        Box::pin(stream_events(
            self.http_client.clone(),
            url,
            self.build_headers(),
            body,
            parse_ollama_line,
        ))
    }

    /// Build headers for API requests
    fn build_headers(&self) -> std::result::Result<HeaderMap, ShellwiseError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(api_key) = &self.config.api_key {
            if api_key != "none" && !api_key.is_empty() {
                let value = HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(|_| {
                    ShellwiseError::InvalidConfig {
                        message: "api_key contains characters not allowed in a header".to_string(),
                    }
                })?;
                headers.insert(AUTHORIZATION, value);
            }
        }
        Ok(headers)
    }
}

impl ChatTransport for LlmClient {
    fn stream_chat(&self, request: ChatRequest) -> ChatStream {
        crate::debug_log!(
            "stream_chat: provider={}, model={}, messages={}, json_mode={}",
            self.config.provider,
            self.config.model,
            request.messages.len(),
            request.json_mode
        );
        match self.config.provider {
            LlmProvider::OpenAiCompatible => self.stream_openai(request),
            LlmProvider::Ollama => self.stream_ollama(request),
        }
    }
}

/// POST `body` and decode the response line by line until the provider's done marker or EOF.
fn stream_events<B>(
    http_client: HttpClient,
    url: String,
    headers: std::result::Result<HeaderMap, ShellwiseError>,
    body: B,
    parse_line: fn(&str) -> std::result::Result<Vec<StreamEvent>, ShellwiseError>,
) -> impl Stream<Item = std::result::Result<StreamEvent, ShellwiseError>> + Send
where
    B: Serialize + Send + Sync + 'static,
{
    async_stream::try_stream! {
        let response = http_client
            .post(&url)
            .headers(headers?)
            .json(&body)
            .send()
            .await?;
        let response = check_status(response).await?;

        let mut bytes = response.bytes_stream();
        let mut lines = SseLineBuffer::new();
        let mut done = false;

        'read: while let Some(chunk) = bytes.next().await {
            let chunk = chunk?;
            for line in lines.push(&chunk) {
                for event in parse_line(&line)? {
                    done = event.is_done();
                    yield event;
                    if done {
                        break 'read;
                    }
                }
            }
        }

        // A provider that closes without a trailing newline still gets its last line read
        if !done {
            if let Some(line) = lines.finish() {
                for event in parse_line(&line)? {
                    yield event;
                }
            }
        }
    }
}

/// Turn a non-2xx response into a provider error with the server's message
async fn check_status(response: Response) -> std::result::Result<Response, ShellwiseError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ShellwiseError::ProviderError {
        status: status.as_u16(),
        message: provider_error_message(&body),
    })
}

// OpenAI-compatible API types
#[derive(Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

// Ollama API types
#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}
