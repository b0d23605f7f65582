//! Approval workflow for suggested commands
//!
//! One command goes straight to a confirm phase (run / insert / cancel).
//! Several commands are reviewed one at a time (run / skip / cancel). Nothing
//! reaches the shell without a decision from the user.

use crate::keys::Key;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Exactly one command
    Confirm,
    /// Several commands, `index` is the one under review
    Review { index: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Run,
    Insert,
    Skip,
    Cancel,
}

/// What the session should do after a decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Settling, or the decision is not offered in this phase
    Ignored,
    /// Skipped; the next command is now under review
    Advance,
    /// Write `payload`, then wait for the settle delay before the next review
    Settle { payload: String },
    /// Workflow over. `payload` is what to write, if anything
    Finished { payload: Option<String> },
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct ApprovalFlow {
    commands: Vec<String>,
    phase: Phase,
    settling: bool,
}

impl ApprovalFlow {
    /// `None` for an empty list; such responses never enter approval.
    pub fn start(commands: Vec<String>) -> Option<Self> {
        let phase = match commands.len() {
            0 => return None,
            1 => Phase::Confirm,
            _ => Phase::Review { index: 0 },
        };
        Some(Self {
            commands,
            phase,
            settling: false,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    pub fn total(&self) -> usize {
        self.commands.len()
    }

    pub fn is_settling(&self) -> bool {
        self.settling
    }

    /// The command the current prompt is about.
    pub fn current(&self) -> &str {
        let index = match self.phase {
            Phase::Confirm => 0,
            Phase::Review { index } => index,
        };
        self.commands.get(index).map(String::as_str).unwrap_or_default()
    }

    /// Key bindings for the current phase.
    pub fn decision_for(&self, key: Key) -> Option<Decision> {
        match (self.phase, key) {
            (_, Key::Escape | Key::CtrlC | Key::Char('q')) => Some(Decision::Cancel),
            (_, Key::Enter | Key::Char('r') | Key::Char('y')) => Some(Decision::Run),
            (Phase::Confirm, Key::Char('n')) => Some(Decision::Cancel),
            (Phase::Confirm, Key::Char('i') | Key::Tab) => Some(Decision::Insert),
            (Phase::Review { .. }, Key::Char('s') | Key::Char('n')) => Some(Decision::Skip),
            _ => None,
        }
    }

    pub fn decide(&mut self, decision: Decision) -> Outcome {
        if self.settling {
            return Outcome::Ignored;
        }
        match (self.phase, decision) {
            (_, Decision::Cancel) => Outcome::Cancelled,
            (Phase::Confirm, Decision::Run) => Outcome::Finished {
                payload: Some(shell_payload(self.current(), true)),
            },
            (Phase::Confirm, Decision::Insert) => Outcome::Finished {
                payload: Some(shell_payload(self.current(), false)),
            },
            (Phase::Review { index }, Decision::Run) => {
                let payload = shell_payload(self.current(), true);
                if self.is_last(index) {
                    Outcome::Finished {
                        payload: Some(payload),
                    }
                } else {
                    self.settling = true;
                    Outcome::Settle { payload }
                }
            }
            (Phase::Review { index }, Decision::Skip) => {
                if self.is_last(index) {
                    Outcome::Finished { payload: None }
                } else {
                    self.phase = Phase::Review { index: index + 1 };
                    Outcome::Advance
                }
            }
            (Phase::Confirm, Decision::Skip) | (Phase::Review { .. }, Decision::Insert) => {
                Outcome::Ignored
            }
        }
    }

    /// End of the settle delay: move on to the next command. False if there was nothing to settle.
    pub fn settle_elapsed(&mut self) -> bool {
        if !self.settling {
            return false;
        }
        self.settling = false;
        if let Phase::Review { index } = self.phase {
            self.phase = Phase::Review { index: index + 1 };
        }
        true
    }

    fn is_last(&self, index: usize) -> bool {
        index + 1 >= self.commands.len()
    }
}

/// Shell text for a command: each newline becomes a carriage return so
/// multi-line bodies are entered line by line. `submit` adds the final Enter.
pub fn shell_payload(command: &str, submit: bool) -> String {
    let body = command
        .trim_end_matches(['\r', '\n'])
        .replace("\r\n", "\r")
        .replace('\n', "\r");
    if submit {
        body + "\r"
    } else {
        body
    }
}
