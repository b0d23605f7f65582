//! Wire framing for streamed responses
//!
//! Both providers stream newline-delimited text: OpenAI-compatible servers
//! send SSE `data:` lines, Ollama sends one JSON object per line. Everything
//! here is pure so it can be tested without a server.

use super::chat::{StreamEvent, TokenUsage};
use crate::error::ShellwiseError;
use serde::Deserialize;

/// Accumulates raw bytes and hands out complete lines.
///
/// Bytes are only decoded once a full line is present, so a UTF-8 sequence
/// split across two network chunks survives intact.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    pending: Vec<u8>,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning every line it completed (without `\r\n`).
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let rest = self.pending.split_off(pos + 1);
            let mut line = std::mem::replace(&mut self.pending, rest);
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Whatever is left when the connection closes without a trailing newline.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        let line = String::from_utf8_lossy(&rest).trim_end_matches('\r').to_string();
        (!line.trim().is_empty()).then_some(line)
    }
}

#[derive(Deserialize)]
struct OpenAiStreamResponse {
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
    #[serde(default)]
    error: Option<ProviderErrorBody>,
}

#[derive(Deserialize)]
struct OpenAiStreamChoice {
    #[serde(default)]
    delta: OpenAiDelta,
}

#[derive(Deserialize, Default)]
struct OpenAiDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

/// `{"error": "msg"}` or `{"error": {"message": "msg", ...}}`
#[derive(Deserialize)]
#[serde(untagged)]
enum ProviderErrorBody {
    Plain(String),
    Detailed { message: String },
}

impl ProviderErrorBody {
    fn into_message(self) -> String {
        match self {
            ProviderErrorBody::Plain(message) | ProviderErrorBody::Detailed { message } => message,
        }
    }
}

/// Decode one SSE line from an OpenAI-compatible stream.
pub fn parse_openai_line(line: &str) -> Result<Vec<StreamEvent>, ShellwiseError> {
    let line = line.trim_end();
    // Blank lines separate events, ':' lines are keep-alive comments.
    if line.is_empty() || line.starts_with(':') {
        return Ok(Vec::new());
    }
    let Some(data) = line.strip_prefix("data:") else {
        // event:/id:/retry: fields carry nothing we use
        return Ok(Vec::new());
    };
    let data = data.trim_start();
    if data == "[DONE]" {
        return Ok(vec![StreamEvent::Done]);
    }

    let parsed: OpenAiStreamResponse =
        serde_json::from_str(data).map_err(|e| ShellwiseError::MalformedStream {
            reason: format!("{} in {:?}", e, truncate(data, 120)),
        })?;

    if let Some(error) = parsed.error {
        return Err(ShellwiseError::ProviderError {
            status: 200,
            message: error.into_message(),
        });
    }

    let mut events = Vec::new();
    for choice in parsed.choices {
        if let Some(content) = choice.delta.content {
            if !content.is_empty() {
                events.push(StreamEvent::Content(content));
            }
        }
    }
    if let Some(usage) = parsed.usage {
        events.push(StreamEvent::Usage(TokenUsage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }));
    }
    Ok(events)
}

#[derive(Deserialize)]
struct OllamaStreamLine {
    #[serde(default)]
    message: Option<OllamaMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
}

/// Decode one NDJSON line from Ollama's `/api/chat`.
pub fn parse_ollama_line(line: &str) -> Result<Vec<StreamEvent>, ShellwiseError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Vec::new());
    }

    let parsed: OllamaStreamLine =
        serde_json::from_str(line).map_err(|e| ShellwiseError::MalformedStream {
            reason: format!("{} in {:?}", e, truncate(line, 120)),
        })?;

    if let Some(message) = parsed.error {
        return Err(ShellwiseError::ProviderError {
            status: 200,
            message,
        });
    }

    let mut events = Vec::new();
    if let Some(message) = parsed.message {
        if !message.content.is_empty() {
            events.push(StreamEvent::Content(message.content));
        }
    }
    if parsed.done {
        let prompt_tokens = parsed.prompt_eval_count.unwrap_or(0);
        let completion_tokens = parsed.eval_count.unwrap_or(0);
        events.push(StreamEvent::Usage(TokenUsage {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }));
        events.push(StreamEvent::Done);
    }
    Ok(events)
}

/// Pull a readable message out of a non-2xx response body.
pub fn provider_error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct Envelope {
        error: ProviderErrorBody,
    }

    match serde_json::from_str::<Envelope>(body) {
        Ok(envelope) => envelope.error.into_message(),
        Err(_) if body.trim().is_empty() => "empty response body".to_string(),
        Err(_) => truncate(body.trim(), 200).to_string(),
    }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
