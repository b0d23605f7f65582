//! Per-session state machine
//!
//! A [`Session`] owns one shell's AI interaction: `Idle -> Input -> Streaming
//! -> Approval -> Idle`, with cancel paths back to `Idle` from every mode.
//! Handlers never touch the terminal, the shell or the network. They return
//! [`Effect`]s and the runtime carries them out in order.

mod controller;
pub mod history;
pub mod render;

pub use history::InputHistory;

use crate::approval::ApprovalFlow;
use crate::ids::{RequestId, SessionId};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Keystrokes go to the shell
    Idle,
    /// Composing a prompt
    Input,
    /// Waiting for the model
    Streaming,
    /// Deciding on suggested commands
    Approval,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Idle => "idle",
            Mode::Input => "input",
            Mode::Streaming => "streaming",
            Mode::Approval => "approval",
        };
        f.write_str(name)
    }
}

/// Instructions for the runtime, executed in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Bytes for the shell's PTY
    WriteShell(String),
    /// Bytes for the user's terminal only
    Display(String),
    /// Capture terminal context and start an inference request
    Query { request: RequestId, prompt: String },
    /// Ask for filesystem completions of `partial`, answered by [`SessionEvent::CompletionResult`]
    Complete { partial: String },
    /// Send [`SessionEvent::SettleElapsed`] after the delay
    ScheduleSettle(Duration),
}

/// Everything a session reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Trigger,
    Keystroke(String),
    Paste(String),
    Chunk { request: RequestId, text: String },
    Complete { request: RequestId },
    Failure { request: RequestId, message: String },
    CompletionResult(Vec<String>),
    SettleElapsed,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Pause after running a reviewed command before the next prompt
    pub settle_delay: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(400),
        }
    }
}

#[derive(Debug)]
struct PendingCompletion {
    block: u64,
    partial: String,
}

#[derive(Debug)]
pub struct Session {
    id: SessionId,
    mode: Mode,
    input: String,
    response: String,
    approval: Option<ApprovalFlow>,
    history: InputHistory,
    /// The only request whose callbacks are applied
    pending_request: Option<RequestId>,
    last_request: RequestId,
    /// Counts inline blocks so completions can tell which block asked
    block: u64,
    /// Outstanding completion request; at most one at a time, across blocks
    completing: Option<PendingCompletion>,
    settings: SessionSettings,
}

impl Session {
    pub fn new(id: SessionId, settings: SessionSettings) -> Self {
        Self {
            id,
            mode: Mode::Idle,
            input: String::new(),
            response: String::new(),
            approval: None,
            history: InputHistory::new(),
            pending_request: None,
            last_request: RequestId(0),
            block: 0,
            completing: None,
            settings,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn history(&self) -> &InputHistory {
        &self.history
    }

    pub fn approval(&self) -> Option<&ApprovalFlow> {
        self.approval.as_ref()
    }

    pub fn handle(&mut self, event: SessionEvent) -> Vec<Effect> {
        match event {
            SessionEvent::Trigger => self.on_trigger_inline(),
            SessionEvent::Keystroke(data) => self.on_raw_keystroke(&data),
            SessionEvent::Paste(text) => self.on_paste_text(&text),
            SessionEvent::Chunk { request, text } => self.on_chunk(request, &text),
            SessionEvent::Complete { request } => self.on_complete(request),
            SessionEvent::Failure { request, message } => self.on_failure(request, &message),
            SessionEvent::CompletionResult(matches) => self.on_completion_result(&matches),
            SessionEvent::SettleElapsed => self.on_settle_elapsed(),
        }
    }

    fn set_mode(&mut self, mode: Mode) {
        if self.mode != mode {
            crate::debug_log!("[{}] {} -> {}", self.id.short(), self.mode, mode);
            self.mode = mode;
        }
    }
}
