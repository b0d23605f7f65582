//! End-to-end tests: registry, controller, gateway and parser together
//! against a scripted transport.

use crate::approval::Phase;
use crate::engine::{Engine, TerminalContext};
use crate::gateway::tests::{content, refused, MockTransport, Script};
use crate::gateway::{GatewayEvent, GatewaySettings};
use crate::ids::SessionId;
use crate::llm::StreamEvent;
use crate::session::{Effect, Mode, SessionEvent, SessionSettings};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

struct FixedContext(&'static str);

impl TerminalContext for FixedContext {
    fn capture_recent_output(&self, _session: SessionId, _line_count: usize) -> String {
        self.0.to_string()
    }
}

struct Harness {
    engine: Engine,
    events: mpsc::UnboundedReceiver<GatewayEvent>,
    transport: Arc<MockTransport>,
    id: SessionId,
    context: FixedContext,
    shell: Vec<String>,
    display: Vec<String>,
}

impl Harness {
    fn new(scripts: Vec<Script>) -> Self {
        let transport = MockTransport::new(scripts);
        let (mut engine, events) = Engine::new(
            transport.clone(),
            GatewaySettings {
                system_prompt: "You suggest shell commands.".to_string(),
                history_limit: 10,
                json_mode: true,
            },
            SessionSettings {
                settle_delay: Duration::from_millis(10),
            },
            40,
        );
        let id = engine.create_session();
        Self {
            engine,
            events,
            transport,
            id,
            context: FixedContext("$ pwd\n/home/dev"),
            shell: Vec::new(),
            display: Vec::new(),
        }
    }

    fn record(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::WriteShell(text) => self.shell.push(text),
                Effect::Display(text) => self.display.push(text),
                _ => {}
            }
        }
    }

    fn send(&mut self, event: SessionEvent) {
        let effects = self.engine.handle(self.id, event, &self.context);
        self.record(effects);
    }

    fn keys(&mut self, data: &str) {
        self.send(SessionEvent::Keystroke(data.to_string()));
    }

    /// Trigger, type the prompt, submit, then deliver every gateway event.
    async fn ask(&mut self, prompt: &str) {
        self.send(SessionEvent::Trigger);
        self.keys(prompt);
        self.keys("\r");
        self.pump().await;
    }

    /// Deliver gateway events until the request reports completion or failure.
    async fn pump(&mut self) {
        loop {
            let event = tokio::time::timeout(Duration::from_secs(5), self.events.recv())
                .await
                .expect("gateway went quiet")
                .expect("gateway channel closed");
            let terminal = event.is_terminal();
            let (_, effects) = self.engine.on_gateway_event(event, &self.context);
            self.record(effects);
            if terminal {
                break;
            }
        }
    }

    fn mode(&self) -> Mode {
        self.engine.registry().get(self.id).map(|s| s.mode()).unwrap()
    }

    fn phase(&self) -> Option<Phase> {
        self.engine
            .registry()
            .get(self.id)
            .and_then(|s| s.approval())
            .map(|flow| flow.phase())
    }

    fn commands(&self) -> Vec<String> {
        self.engine
            .registry()
            .get(self.id)
            .and_then(|s| s.approval())
            .map(|flow| flow.commands().to_vec())
            .unwrap_or_default()
    }

    fn ledger_len(&self) -> usize {
        self.engine.gateway().ledger_len(self.id)
    }

    fn shown(&self) -> String {
        console::strip_ansi_codes(&self.display.concat()).to_string()
    }
}

fn chunked(text: &str, size: usize) -> Script {
    let chars: Vec<char> = text.chars().collect();
    let mut script: Script = chars
        .chunks(size)
        .map(|piece| content(&piece.iter().collect::<String>()))
        .collect();
    script.push(Ok(StreamEvent::Done));
    script
}

#[tokio::test]
async fn test_single_command_confirm_and_run() {
    let mut h = Harness::new(vec![chunked(
        r#"{"text":"Use ls","commands":["ls -la"]}"#,
        5,
    )]);

    h.ask("list files").await;
    assert_eq!(h.mode(), Mode::Approval);
    assert_eq!(h.phase(), Some(Phase::Confirm));
    assert_eq!(h.commands(), vec!["ls -la"]);
    assert!(h.shown().contains("Use ls"));
    assert!(h.shell.is_empty());

    h.keys("r");
    assert_eq!(h.shell, vec!["ls -la\r"]);
    assert_eq!(h.mode(), Mode::Idle);

    let sent = h.transport.requests.lock();
    let user = &sent[0].messages[1].content;
    assert!(user.contains("/home/dev"));
    assert!(user.ends_with("list files"));
    assert!(sent[0].json_mode);
}

#[tokio::test]
async fn test_review_skip_then_run_last() {
    let mut h = Harness::new(vec![chunked(
        r#"{"text":"Two steps","commands":["mkdir foo","cd foo"]}"#,
        7,
    )]);

    h.ask("make a dir and enter it").await;
    assert_eq!(h.phase(), Some(Phase::Review { index: 0 }));
    assert_eq!(h.commands().len(), 2);

    h.keys("s");
    assert_eq!(h.phase(), Some(Phase::Review { index: 1 }));
    assert!(h.shell.is_empty());

    h.keys("r");
    assert_eq!(h.shell, vec!["cd foo\r"]);
    assert_eq!(h.mode(), Mode::Idle);
}

#[tokio::test]
async fn test_transport_failure_leaves_ledger_untouched() {
    let mut h = Harness::new(vec![
        chunked(r#"{"text":"hi"}"#, 4),
        vec![refused()],
    ]);

    h.ask("hello").await;
    let before = h.ledger_len();
    assert_eq!(before, 2);

    h.ask("list files").await;
    assert_eq!(h.ledger_len(), before);
    assert_eq!(h.mode(), Mode::Idle);
    assert!(h.shown().contains("Connection refused"));
}

#[tokio::test]
async fn test_prompt_lines_without_json() {
    let mut h = Harness::new(vec![vec![content("Try this:\n$ echo hi\n")]]);

    h.ask("say hi").await;
    assert_eq!(h.commands(), vec!["echo hi"]);
    assert_eq!(h.phase(), Some(Phase::Confirm));
}

#[tokio::test]
async fn test_cancel_review_runs_nothing() {
    let mut h = Harness::new(vec![chunked(
        r#"{"text":"Two steps","commands":["mkdir foo","cd foo"]}"#,
        9,
    )]);

    h.ask("two things").await;
    h.keys("\x1b");
    assert_eq!(h.mode(), Mode::Idle);
    // only the blank line that restores the prompt
    assert_eq!(h.shell, vec!["\r"]);
}

#[tokio::test]
async fn test_cancelled_stream_is_never_shown() {
    let mut h = Harness::new(vec![chunked(
        r#"{"text":"late answer","commands":["ls"]}"#,
        6,
    )]);

    h.send(SessionEvent::Trigger);
    h.keys("list\r");
    h.keys("\x03");
    assert_eq!(h.mode(), Mode::Idle);

    h.pump().await;
    assert_eq!(h.mode(), Mode::Idle);
    assert!(!h.shown().contains("late answer"));
}

#[tokio::test]
async fn test_review_run_waits_for_settle() {
    let mut h = Harness::new(vec![chunked(
        r#"{"text":"","commands":["make","make test"]}"#,
        8,
    )]);

    h.ask("build and test").await;
    let effects = h.engine.handle(h.id, SessionEvent::Keystroke("r".into()), &h.context);
    assert!(effects.contains(&Effect::WriteShell("make\r".into())));
    assert!(effects.contains(&Effect::ScheduleSettle(Duration::from_millis(10))));

    h.keys("r");
    assert!(h.shell.is_empty());

    h.send(SessionEvent::SettleElapsed);
    assert_eq!(h.phase(), Some(Phase::Review { index: 1 }));
    h.keys("\r");
    assert_eq!(h.shell, vec!["make test\r"]);
}
