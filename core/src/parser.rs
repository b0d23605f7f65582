//! Response parser for command suggestions
//!
//! The model is asked for `{"text": ..., "commands": [...]}` but local models
//! drift from the schema, so parsing is a fallback chain of pure tiers. The
//! first tier that recognises the text wins; the last one always succeeds.

use serde_json::{Map, Value};

/// Field names accepted for the explanation, in priority order.
const TEXT_FIELDS: &[&str] = &[
    "text",
    "explanation",
    "message",
    "description",
    "response",
    "answer",
    "content",
    "reply",
];

/// Field names accepted for the command list, in priority order.
const LIST_FIELDS: &[&str] = &["commands", "command", "cmds", "cmd", "steps", "suggestions"];

/// Marker for shell-prompt style lines in free text.
const PROMPT_MARKER: &str = "$ ";

const FENCE: &str = "```";

/// Which tier produced a [`ParsedResponse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// A JSON object with recognised fields
    Structured,
    /// Free text with fenced code blocks
    Fenced,
    /// Free text with `$ ` prompt lines
    Prompted,
    /// Nothing runnable found
    Plain,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResponse {
    pub explanation: String,
    /// Ordered, never blank; entries may contain embedded newlines
    pub commands: Vec<String>,
    pub shape: ResponseShape,
}

impl ParsedResponse {
    fn plain(raw: &str) -> Self {
        Self {
            explanation: raw.to_string(),
            commands: Vec::new(),
            shape: ResponseShape::Plain,
        }
    }
}

/// Turn accumulated model output into an explanation and ordered commands. Never fails.
pub fn parse(raw: &str) -> ParsedResponse {
    parse_structured(raw)
        .or_else(|| parse_fenced(raw))
        .or_else(|| parse_prompted(raw))
        .unwrap_or_else(|| ParsedResponse::plain(raw))
}

/// Tier 1: a single JSON object, optionally wrapped in one ```json fence.
pub fn parse_structured(raw: &str) -> Option<ParsedResponse> {
    let candidate = strip_enclosing_fence(raw.trim());
    if !candidate.starts_with('{') {
        return None;
    }

    let value: Value = serde_json::from_str(candidate)
        .or_else(|_| serde_json::from_str(&escape_unescaped_newlines_in_json_strings(candidate)))
        .ok()?;
    let object = value.as_object()?;

    let text = lookup(object, TEXT_FIELDS);
    let list = lookup(object, LIST_FIELDS);
    if text.is_none() && list.is_none() {
        return None;
    }

    let explanation = text.and_then(Value::as_str).unwrap_or_default().to_string();
    let commands = match list {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .filter(|cmd| !cmd.trim().is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::String(single)) if !single.trim().is_empty() => vec![single.clone()],
        _ => Vec::new(),
    };

    Some(ParsedResponse {
        explanation,
        commands,
        shape: ResponseShape::Structured,
    })
}

/// Tier 2: every fenced code block becomes one command.
pub fn parse_fenced(raw: &str) -> Option<ParsedResponse> {
    let commands: Vec<String> = extract_fenced_blocks(raw)
        .into_iter()
        .filter(|block| !block.is_empty())
        .collect();
    if commands.is_empty() {
        return None;
    }
    Some(ParsedResponse {
        explanation: raw.to_string(),
        commands,
        shape: ResponseShape::Fenced,
    })
}

/// Tier 3: lines that look like `$ command`.
pub fn parse_prompted(raw: &str) -> Option<ParsedResponse> {
    let commands: Vec<String> = raw
        .lines()
        .filter_map(|line| line.trim().strip_prefix(PROMPT_MARKER))
        .map(str::trim)
        .filter(|cmd| !cmd.is_empty())
        .map(str::to_string)
        .collect();
    if commands.is_empty() {
        return None;
    }
    Some(ParsedResponse {
        explanation: raw.to_string(),
        commands,
        shape: ResponseShape::Prompted,
    })
}

/// Case-insensitive lookup of the first field name that is present.
fn lookup<'a>(object: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|name| {
        object
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    })
}

/// Contents of every ``` fenced block, trimmed, in order.
///
/// Text after the opening fence on the same line is an info string
/// (`bash`, `sh`, ...) and is not part of the block. A block that opens and
/// closes on one line (```ls```) keeps its inline text.
pub fn extract_fenced_blocks(content: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut rest = content;

    while let Some(open) = rest.find(FENCE) {
        let after_open = &rest[open + FENCE.len()..];
        let Some(close) = after_open.find(FENCE) else {
            break;
        };
        let inner = &after_open[..close];
        let body = match inner.find('\n') {
            Some(newline) => &inner[newline + 1..],
            None => inner,
        };
        blocks.push(body.trim().to_string());
        rest = &after_open[close + FENCE.len()..];
    }

    blocks
}

/// `"```json\n{...}\n```"` -> `"{...}"`; anything else is returned as is.
fn strip_enclosing_fence(trimmed: &str) -> &str {
    let Some(after_open) = trimmed.strip_prefix(FENCE) else {
        return trimmed;
    };
    let Some(inner) = after_open.strip_suffix(FENCE) else {
        return trimmed;
    };
    if inner.contains(FENCE) {
        return trimmed;
    }
    match inner.find('\n') {
        Some(newline) => inner[newline + 1..].trim(),
        None => inner.trim(),
    }
}

/// Convert invalid JSON containing literal newlines inside string values into valid JSON.
///
/// Only escapes `\n`/`\r`/`\t` when inside a JSON string literal. Local
/// models do this a lot with heredocs.
fn escape_unescaped_newlines_in_json_strings(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_string = false;
    let mut escape = false;

    for ch in input.chars() {
        if in_string {
            if escape {
                out.push(ch);
                escape = false;
                continue;
            }
            match ch {
                '\\' => {
                    out.push(ch);
                    escape = true;
                }
                '"' => {
                    out.push(ch);
                    in_string = false;
                }
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                _ => out.push(ch),
            }
        } else {
            out.push(ch);
            if ch == '"' {
                in_string = true;
            }
        }
    }

    out
}
