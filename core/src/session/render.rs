//! Text the controller shows on the terminal
//!
//! The terminal is in raw mode, so every line break is `\r\n`.

use crate::approval::{ApprovalFlow, Phase};
use console::Style;

pub const INPUT_PROMPT: &str = "ai> ";

/// Erases one echoed character.
pub const ERASE_CHAR: &str = "\x08 \x08";

fn paint(text: &str, style: Style) -> String {
    style.force_styling(true).apply_to(text).to_string()
}

fn crlf(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\n', "\r\n")
}

pub fn start_marker() -> String {
    format!(
        "\r\n{}\r\n{}",
        paint("── shellwise ──", Style::new().cyan().bold()),
        paint(INPUT_PROMPT, Style::new().cyan())
    )
}

pub fn end_marker() -> String {
    format!("\r\n{}\r\n", paint("── end ──", Style::new().cyan().dim()))
}

pub fn working() -> String {
    format!("\r\n{}", paint("thinking...", Style::new().dim()))
}

pub fn cancelled() -> String {
    format!("\r\n{}", paint("cancelled", Style::new().yellow()))
}

pub fn explanation(text: &str) -> String {
    format!("\r\n{}", crlf(text.trim_end()))
}

pub fn failure(message: &str) -> String {
    format!("\r\n{}", paint(&format!("error: {}", message), Style::new().red()))
}

/// Shown in place of a line break so the prompt never spans rows.
const NEWLINE_GLYPH: char = '↵';

/// Erase the current input line and show `text` after the prompt.
pub fn replace_input(text: &str) -> String {
    format!("\r\x1b[2K{}{}", paint(INPUT_PROMPT, Style::new().cyan()), echo(text))
}

/// Prompt input stays on one row; line breaks become a one-column glyph.
pub fn echo(text: &str) -> String {
    text.replace("\r\n", "\n").replace(['\n', '\r'], &NEWLINE_GLYPH.to_string())
}

fn command_block(command: &str) -> String {
    command
        .lines()
        .map(|line| format!("  {}", paint(line, Style::new().green().bold())))
        .collect::<Vec<_>>()
        .join("\r\n")
}

/// Prompt for whatever the workflow is waiting on.
pub fn approval_prompt(flow: &ApprovalFlow) -> String {
    let keys = Style::new().dim();
    match flow.phase() {
        Phase::Confirm => format!(
            "\r\n{}\r\n{}",
            command_block(flow.current()),
            paint("[enter/r] run  [i] insert  [esc] cancel", keys)
        ),
        Phase::Review { index } => format!(
            "\r\n{} {}\r\n{}\r\n{}",
            paint(&format!("[{}/{}]", index + 1, flow.total()), Style::new().cyan()),
            "review",
            command_block(flow.current()),
            paint("[enter/r] run  [s] skip  [esc] cancel", keys)
        ),
    }
}
