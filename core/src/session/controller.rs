use super::{render, Effect, Mode, PendingCompletion, Session};
use crate::approval::{ApprovalFlow, Outcome};
use crate::completion::{completion_suffix, trailing_token};
use crate::ids::RequestId;
use crate::keys::Key;
use crate::parser;

/// Gives the shell a fresh prompt after a block that wrote nothing.
const BLANK_LINE: &str = "\r";

impl Session {
    /// Start an inline block. Ignored unless idle.
    pub fn on_trigger_inline(&mut self) -> Vec<Effect> {
        if self.mode != Mode::Idle {
            return Vec::new();
        }
        self.input.clear();
        self.response.clear();
        self.approval = None;
        self.block += 1;
        self.history.reset();
        self.set_mode(Mode::Input);
        vec![Effect::Display(render::start_marker())]
    }

    pub fn on_raw_keystroke(&mut self, data: &str) -> Vec<Effect> {
        if self.mode == Mode::Idle {
            return if data.is_empty() {
                Vec::new()
            } else {
                vec![Effect::WriteShell(data.to_string())]
            };
        }

        let mut effects = Vec::new();
        for key in Key::decode(data) {
            match self.mode {
                Mode::Input => self.input_key(key, &mut effects),
                Mode::Streaming => {
                    if key.is_cancel() {
                        self.cancel_streaming(&mut effects);
                    }
                }
                Mode::Approval => self.approval_key(key, &mut effects),
                // the block ended mid-read; the rest was typed for the block, not the shell
                Mode::Idle => break,
            }
        }
        effects
    }

    /// Pasted text is prompt input while composing and shell input while idle.
    pub fn on_paste_text(&mut self, text: &str) -> Vec<Effect> {
        match self.mode {
            Mode::Idle if !text.is_empty() => vec![Effect::WriteShell(text.to_string())],
            Mode::Input if !text.is_empty() => {
                self.input.push_str(text);
                vec![Effect::Display(render::echo(text))]
            }
            _ => Vec::new(),
        }
    }

    pub fn on_chunk(&mut self, request: RequestId, text: &str) -> Vec<Effect> {
        if self.accepts(request) {
            self.response.push_str(text);
        } else {
            crate::trace_log!("[{}] dropped chunk for {}", self.id.short(), request);
        }
        Vec::new()
    }

    pub fn on_complete(&mut self, request: RequestId) -> Vec<Effect> {
        if !self.accepts(request) {
            crate::debug_log!("[{}] dropped completion for {}", self.id.short(), request);
            return Vec::new();
        }
        self.pending_request = None;

        let raw = std::mem::take(&mut self.response);
        let parsed = parser::parse(&raw);
        crate::info_log!(
            "[{}] {} complete: {:?} response, {} command(s)",
            self.id.short(),
            request,
            parsed.shape,
            parsed.commands.len()
        );

        let mut effects = Vec::new();
        if !parsed.explanation.trim().is_empty() {
            effects.push(Effect::Display(render::explanation(&parsed.explanation)));
        }
        match ApprovalFlow::start(parsed.commands) {
            Some(flow) => {
                effects.push(Effect::Display(render::approval_prompt(&flow)));
                self.approval = Some(flow);
                self.set_mode(Mode::Approval);
            }
            None => self.exit_to_idle(&mut effects, false),
        }
        effects
    }

    pub fn on_failure(&mut self, request: RequestId, message: &str) -> Vec<Effect> {
        if !self.accepts(request) {
            crate::debug_log!("[{}] dropped failure for {}", self.id.short(), request);
            return Vec::new();
        }
        let mut effects = vec![Effect::Display(render::failure(message))];
        self.exit_to_idle(&mut effects, false);
        effects
    }

    /// Append the part of the common prefix beyond what was typed.
    /// Always frees the completion slot; the result only applies to the block that asked.
    pub fn on_completion_result(&mut self, matches: &[String]) -> Vec<Effect> {
        let Some(PendingCompletion { block, partial }) = self.completing.take() else {
            return Vec::new();
        };
        if block != self.block || self.mode != Mode::Input || !self.input.ends_with(&partial) {
            crate::trace_log!("[{}] dropped completion for {:?}", self.id.short(), partial);
            return Vec::new();
        }
        let suffix = completion_suffix(&partial, matches);
        if suffix.is_empty() {
            return Vec::new();
        }
        self.input.push_str(&suffix);
        vec![Effect::Display(render::echo(&suffix))]
    }

    pub fn on_settle_elapsed(&mut self) -> Vec<Effect> {
        if self.mode != Mode::Approval {
            return Vec::new();
        }
        let Some(flow) = self.approval.as_mut() else {
            return Vec::new();
        };
        if !flow.settle_elapsed() {
            return Vec::new();
        }
        vec![Effect::Display(render::approval_prompt(flow))]
    }

    fn accepts(&self, request: RequestId) -> bool {
        self.mode == Mode::Streaming && self.pending_request == Some(request)
    }

    fn input_key(&mut self, key: Key, effects: &mut Vec<Effect>) {
        match key {
            Key::Char(c) => {
                self.input.push(c);
                effects.push(Effect::Display(c.to_string()));
            }
            Key::Backspace => {
                if self.input.pop().is_some() {
                    effects.push(Effect::Display(render::ERASE_CHAR.to_string()));
                }
            }
            Key::Tab => {
                if self.completing.is_none() {
                    let partial = trailing_token(&self.input).to_string();
                    self.completing = Some(PendingCompletion {
                        block: self.block,
                        partial: partial.clone(),
                    });
                    effects.push(Effect::Complete { partial });
                }
            }
            Key::Up => {
                if let Some(entry) = self.history.previous(&self.input) {
                    effects.push(Effect::Display(render::replace_input(&entry)));
                    self.input = entry;
                }
            }
            Key::Down => {
                if let Some(entry) = self.history.next() {
                    effects.push(Effect::Display(render::replace_input(&entry)));
                    self.input = entry;
                }
            }
            Key::Enter => self.submit(effects),
            Key::Escape | Key::CtrlC => self.exit_to_idle(effects, false),
            Key::Unknown => {}
        }
    }

    fn submit(&mut self, effects: &mut Vec<Effect>) {
        let prompt = self.input.trim().to_string();
        if prompt.is_empty() {
            self.exit_to_idle(effects, false);
            return;
        }

        self.history.push(prompt.clone());
        self.input.clear();
        self.response.clear();

        let request = self.last_request.next();
        self.last_request = request;
        self.pending_request = Some(request);
        self.set_mode(Mode::Streaming);

        effects.push(Effect::Display(render::working()));
        effects.push(Effect::Query { request, prompt });
    }

    /// The request keeps streaming; its callbacks no longer match.
    fn cancel_streaming(&mut self, effects: &mut Vec<Effect>) {
        if let Some(request) = self.pending_request {
            crate::debug_log!("[{}] cancelled {} while streaming", self.id.short(), request);
        }
        effects.push(Effect::Display(render::cancelled()));
        self.exit_to_idle(effects, false);
    }

    fn approval_key(&mut self, key: Key, effects: &mut Vec<Effect>) {
        let Some(flow) = self.approval.as_mut() else {
            return;
        };
        let Some(decision) = flow.decision_for(key) else {
            return;
        };

        match flow.decide(decision) {
            Outcome::Ignored => {}
            Outcome::Advance => effects.push(Effect::Display(render::approval_prompt(flow))),
            Outcome::Settle { payload } => {
                effects.push(Effect::WriteShell(payload));
                effects.push(Effect::ScheduleSettle(self.settings.settle_delay));
            }
            Outcome::Finished { payload } => {
                let wrote = payload.is_some();
                self.exit_to_idle(effects, wrote);
                if let Some(payload) = payload {
                    effects.push(Effect::WriteShell(payload));
                }
            }
            Outcome::Cancelled => {
                effects.push(Effect::Display(render::cancelled()));
                self.exit_to_idle(effects, false);
            }
        }
    }

    /// Leave the block with the end marker. A blank line gives the shell a fresh prompt
    /// unless a command is about to be written.
    fn exit_to_idle(&mut self, effects: &mut Vec<Effect>, command_follows: bool) {
        self.input.clear();
        self.response.clear();
        self.approval = None;
        self.pending_request = None;
        self.history.reset();
        self.set_mode(Mode::Idle);

        effects.push(Effect::Display(render::end_marker()));
        if !command_follows {
            effects.push(Effect::WriteShell(BLANK_LINE.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::{SessionEvent, SessionSettings};
    use super::*;
    use crate::approval::Phase;
    use crate::ids::SessionId;
    use std::time::Duration;

    fn session() -> Session {
        Session::new(
            SessionId::new(),
            SessionSettings {
                settle_delay: Duration::from_millis(50),
            },
        )
    }

    fn shell_writes(effects: &[Effect]) -> Vec<&str> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::WriteShell(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Trigger, type, submit; returns the request id.
    fn submit(session: &mut Session, prompt: &str) -> RequestId {
        session.on_trigger_inline();
        session.on_raw_keystroke(prompt);
        let effects = session.on_raw_keystroke("\r");
        match effects.last() {
            Some(Effect::Query { request, prompt: sent }) => {
                assert_eq!(sent, prompt.trim());
                *request
            }
            other => panic!("expected query, got {:?}", other),
        }
    }

    fn respond(session: &mut Session, request: RequestId, raw: &str) -> Vec<Effect> {
        session.on_chunk(request, raw);
        session.on_complete(request)
    }

    #[test]
    fn test_idle_passes_everything_to_shell() {
        let mut s = session();
        assert_eq!(s.on_raw_keystroke("ls\r"), vec![Effect::WriteShell("ls\r".into())]);
        assert_eq!(s.on_raw_keystroke("\x1b[A"), vec![Effect::WriteShell("\x1b[A".into())]);
        assert_eq!(s.on_paste_text("echo hi"), vec![Effect::WriteShell("echo hi".into())]);
        assert_eq!(s.mode(), Mode::Idle);
    }

    #[test]
    fn test_trigger_only_from_idle() {
        let mut s = session();
        assert_eq!(s.on_trigger_inline().len(), 1);
        assert_eq!(s.mode(), Mode::Input);
        assert!(s.on_trigger_inline().is_empty());
    }

    #[test]
    fn test_typing_echo_and_backspace() {
        let mut s = session();
        s.on_trigger_inline();
        let effects = s.on_raw_keystroke("ab\x7f");
        assert_eq!(s.input(), "a");
        assert_eq!(effects.last(), Some(&Effect::Display(render::ERASE_CHAR.into())));
        assert!(shell_writes(&effects).is_empty());

        s.on_raw_keystroke("\x7f\x7f");
        assert_eq!(s.input(), "");
    }

    #[test]
    fn test_empty_submit_returns_to_idle_with_fresh_prompt() {
        let mut s = session();
        s.on_trigger_inline();
        let effects = s.on_raw_keystroke("   \r");
        assert_eq!(s.mode(), Mode::Idle);
        assert_eq!(shell_writes(&effects), vec!["\r"]);
        assert!(s.history().entries().is_empty());
    }

    #[test]
    fn test_input_cancel() {
        let mut s = session();
        s.on_trigger_inline();
        s.on_raw_keystroke("half");
        s.on_raw_keystroke("\x1b");
        assert_eq!(s.mode(), Mode::Idle);
        assert_eq!(s.input(), "");
    }

    #[test]
    fn test_paste_in_input_and_streaming() {
        let mut s = session();
        s.on_trigger_inline();
        s.on_raw_keystroke("explain ");
        s.on_paste_text("error: E0382");
        assert_eq!(s.input(), "explain error: E0382");

        s.on_raw_keystroke("\r");
        assert!(s.on_paste_text("ignored").is_empty());
    }

    #[test]
    fn test_streaming_ignores_keys_except_cancel() {
        let mut s = session();
        let request = submit(&mut s, "list files");
        assert!(s.on_raw_keystroke("abc\r").is_empty());
        assert_eq!(s.mode(), Mode::Streaming);

        s.on_raw_keystroke("\x03");
        assert_eq!(s.mode(), Mode::Idle);

        // late callbacks for the cancelled request are dropped
        assert!(s.on_chunk(request, "{\"commands\":[\"ls\"]}").is_empty());
        assert!(s.on_complete(request).is_empty());
        assert_eq!(s.mode(), Mode::Idle);
    }

    #[test]
    fn test_stale_request_ignored_after_resubmit() {
        let mut s = session();
        let old = submit(&mut s, "one");
        s.on_raw_keystroke("\x1b");
        let new = submit(&mut s, "two");
        assert_ne!(old, new);

        s.on_chunk(old, "$ rm -rf /");
        s.on_complete(old);
        assert_eq!(s.mode(), Mode::Streaming);

        respond(&mut s, new, "$ echo two");
        assert_eq!(s.approval().map(|f| f.current()), Some("echo two"));
    }

    #[test]
    fn test_single_command_confirm_then_run() {
        let mut s = session();
        let request = submit(&mut s, "list files");
        respond(&mut s, request, r#"{"text":"Use ls","commands":["ls -la"]}"#);
        assert_eq!(s.mode(), Mode::Approval);
        assert_eq!(s.approval().map(|f| f.phase()), Some(Phase::Confirm));

        let effects = s.on_raw_keystroke("\r");
        assert_eq!(shell_writes(&effects), vec!["ls -la\r"]);
        assert_eq!(s.mode(), Mode::Idle);
    }

    #[test]
    fn test_insert_withholds_enter() {
        let mut s = session();
        let request = submit(&mut s, "delete build");
        respond(&mut s, request, r#"{"text":"","commands":["rm -rf build"]}"#);
        let effects = s.on_raw_keystroke("i");
        assert_eq!(shell_writes(&effects), vec!["rm -rf build"]);
    }

    #[test]
    fn test_no_commands_shows_explanation_and_exits() {
        let mut s = session();
        let request = submit(&mut s, "what is a pty");
        let effects = respond(&mut s, request, "A pseudo terminal.");
        assert_eq!(s.mode(), Mode::Idle);
        assert!(matches!(&effects[0], Effect::Display(text) if text.contains("A pseudo terminal.")));
    }

    #[test]
    fn test_review_run_settles_before_next_prompt() {
        let mut s = session();
        let request = submit(&mut s, "build");
        respond(&mut s, request, r#"{"text":"x","commands":["make","make test"]}"#);

        let effects = s.on_raw_keystroke("r");
        assert_eq!(shell_writes(&effects), vec!["make\r"]);
        assert_eq!(
            effects.last(),
            Some(&Effect::ScheduleSettle(Duration::from_millis(50)))
        );

        // input during the settle delay is rejected
        assert!(s.on_raw_keystroke("r").is_empty());

        let effects = s.on_settle_elapsed();
        assert_eq!(effects.len(), 1);
        assert_eq!(s.approval().map(|f| f.phase()), Some(Phase::Review { index: 1 }));
        // a duplicate timer changes nothing
        assert!(s.on_settle_elapsed().is_empty());
        assert_eq!(s.approval().map(|f| f.phase()), Some(Phase::Review { index: 1 }));

        let effects = s.on_raw_keystroke("y");
        assert_eq!(shell_writes(&effects), vec!["make test\r"]);
        assert_eq!(s.mode(), Mode::Idle);
    }

    #[test]
    fn test_failure_displays_and_exits() {
        let mut s = session();
        let request = submit(&mut s, "q");
        let effects = s.on_failure(request, "Connection refused");
        assert_eq!(s.mode(), Mode::Idle);
        assert!(matches!(&effects[0], Effect::Display(text) if text.contains("Connection refused")));
        assert!(s.on_failure(request, "again").is_empty());
    }

    #[test]
    fn test_history_dedup_and_navigation() {
        let mut s = session();
        for _ in 0..3 {
            let request = submit(&mut s, "same");
            s.on_failure(request, "x");
        }
        assert_eq!(s.history().entries(), &["same"]);

        let request = submit(&mut s, "other");
        s.on_failure(request, "x");

        s.on_trigger_inline();
        s.on_raw_keystroke("draft");
        s.on_raw_keystroke("\x1b[A\x1b[A");
        assert_eq!(s.input(), "same");
        s.on_raw_keystroke("\x1b[B\x1b[B");
        assert_eq!(s.input(), "draft");
    }

    #[test]
    fn test_completion_requests_are_serialized() {
        let mut s = session();
        s.on_trigger_inline();
        s.on_raw_keystroke("cat sr");

        let effects = s.on_raw_keystroke("\t");
        assert_eq!(effects, vec![Effect::Complete { partial: "sr".into() }]);
        assert!(s.on_raw_keystroke("\t").is_empty());

        s.handle(SessionEvent::CompletionResult(vec!["src/".into()]));
        assert_eq!(s.input(), "cat src/");

        // a new request is allowed once the first was answered
        assert_eq!(s.on_raw_keystroke("\t").len(), 1);
    }

    #[test]
    fn test_completion_result_after_edit_is_dropped() {
        let mut s = session();
        s.on_trigger_inline();
        s.on_raw_keystroke("cat sr\t\x7f\x7f");
        assert!(s.on_completion_result(&["src/".to_string()]).is_empty());
        assert_eq!(s.input(), "cat ");
    }

    #[test]
    fn test_completion_stays_busy_across_blocks() {
        let mut s = session();
        s.on_trigger_inline();
        let effects = s.on_raw_keystroke("cat sr\t");
        assert_eq!(effects.last(), Some(&Effect::Complete { partial: "sr".into() }));
        s.on_raw_keystroke("\x1b");
        assert_eq!(s.mode(), Mode::Idle);

        s.on_trigger_inline();
        let effects = s.on_raw_keystroke("cat sr\t");
        assert!(!effects.iter().any(|e| matches!(e, Effect::Complete { .. })));

        // the first block's answer frees the slot without touching this block's input
        assert!(s.on_completion_result(&["src/".to_string()]).is_empty());
        assert_eq!(s.input(), "cat sr");
        assert_eq!(
            s.on_raw_keystroke("\t"),
            vec![Effect::Complete { partial: "sr".into() }]
        );
        s.on_completion_result(&["src/".to_string()]);
        assert_eq!(s.input(), "cat src/");
    }
}
