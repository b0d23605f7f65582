//! Event loop module
//!
//! Every event source feeds one `select!` loop, so all session handling runs
//! on a single task in arrival order:
//! - stdin bytes (trigger, paste, keystrokes)
//! - PTY output and shell exit
//! - gateway chunks, completions and failures
//! - settle timers and completion lookups
//! - terminal resizes

use super::input::{InputEvent, InputSplitter};
use super::pty::{PtyEvent, PtyManager};
use super::screen::Screen;
use anyhow::{Context, Result};
use shellwise_core::completion::{complete_path, process_cwd};
use shellwise_core::{Effect, Engine, GatewayEvent, SessionEvent, SessionId};
use std::io::{self, Write};
use std::path::PathBuf;
use std::thread;
use tokio::sync::mpsc;

pub struct EventLoop {
    engine: Engine,
    session: SessionId,
    pty: PtyManager,
    screen: Screen,
    splitter: InputSplitter,
    launch_dir: PathBuf,
    settle_tx: mpsc::UnboundedSender<()>,
    settle_rx: mpsc::UnboundedReceiver<()>,
    completion_tx: mpsc::UnboundedSender<Vec<String>>,
    completion_rx: mpsc::UnboundedReceiver<Vec<String>>,
}

impl EventLoop {
    pub fn new(
        engine: Engine,
        session: SessionId,
        pty: PtyManager,
        screen: Screen,
        splitter: InputSplitter,
        launch_dir: PathBuf,
    ) -> Self {
        let (settle_tx, settle_rx) = mpsc::unbounded_channel();
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        Self {
            engine,
            session,
            pty,
            screen,
            splitter,
            launch_dir,
            settle_tx,
            settle_rx,
            completion_tx,
            completion_rx,
        }
    }

    /// Returns the shell's exit code once it exits.
    pub async fn run(
        mut self,
        mut pty_rx: mpsc::UnboundedReceiver<PtyEvent>,
        mut gateway_rx: mpsc::UnboundedReceiver<GatewayEvent>,
    ) -> Result<Option<u32>> {
        let mut stdin_rx = spawn_stdin_reader();
        let mut resize_rx = spawn_resize_watcher()?;

        loop {
            tokio::select! {
                Some(bytes) = stdin_rx.recv() => {
                    for input in self.splitter.feed(&bytes) {
                        let event = match input {
                            InputEvent::Trigger => SessionEvent::Trigger,
                            InputEvent::Keys(keys) => SessionEvent::Keystroke(keys),
                            InputEvent::Paste(text) => SessionEvent::Paste(text),
                        };
                        self.dispatch(event)?;
                    }
                }
                event = pty_rx.recv() => match event {
                    Some(PtyEvent::Output(data)) => {
                        self.screen.process(&data);
                        write_stdout(&data)?;
                    }
                    Some(PtyEvent::Exit(code)) => return Ok(self.shutdown(code)),
                    None => return Ok(self.shutdown(None)),
                },
                Some(event) = gateway_rx.recv() => {
                    let (_, effects) = self.engine.on_gateway_event(event, &self.screen);
                    self.apply(effects)?;
                }
                Some(()) = self.settle_rx.recv() => self.dispatch(SessionEvent::SettleElapsed)?,
                Some(matches) = self.completion_rx.recv() => {
                    self.dispatch(SessionEvent::CompletionResult(matches))?;
                }
                Some((cols, rows)) = resize_rx.recv() => {
                    self.screen.resize(rows, cols);
                    if let Err(e) = self.pty.resize(rows, cols) {
                        shellwise_core::error_log!("resize failed: {:#}", e);
                    }
                }
            }
        }
    }

    fn dispatch(&mut self, event: SessionEvent) -> Result<()> {
        let effects = self.engine.handle(self.session, event, &self.screen);
        self.apply(effects)
    }

    fn apply(&mut self, effects: Vec<Effect>) -> Result<()> {
        for effect in effects {
            match effect {
                Effect::WriteShell(text) => self.pty.write_all(text.as_bytes())?,
                Effect::Display(text) => write_stdout(text.as_bytes())?,
                Effect::ScheduleSettle(delay) => {
                    let tx = self.settle_tx.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        let _ = tx.send(());
                    });
                }
                Effect::Complete { partial } => {
                    let cwd = self
                        .pty
                        .pid()
                        .and_then(process_cwd)
                        .unwrap_or_else(|| self.launch_dir.clone());
                    let tx = self.completion_tx.clone();
                    tokio::spawn(async move {
                        let matches = tokio::task::spawn_blocking(move || complete_path(&cwd, &partial))
                            .await
                            .unwrap_or_default();
                        let _ = tx.send(matches);
                    });
                }
                Effect::Query { request, .. } => {
                    // consumed by the engine before effects reach the runtime
                    shellwise_core::error_log!("unexpected query effect {}", request);
                }
            }
        }
        Ok(())
    }

    fn shutdown(&mut self, code: Option<u32>) -> Option<u32> {
        self.engine.destroy_session(self.session);
        let status = code.map_or_else(|| "unknown status".to_string(), |c| format!("status {}", c));
        let _ = write_stdout(format!("\r\n[shellwise] shell exited with {}\r\n", status).as_bytes());
        code
    }
}

fn write_stdout(data: &[u8]) -> Result<()> {
    let mut stdout = io::stdout().lock();
    stdout.write_all(data).context("Failed to write to terminal")?;
    stdout.flush().context("Failed to flush terminal")?;
    Ok(())
}

/// Blocking stdin reads on their own thread, like the PTY reader.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<Vec<u8>> {
    let (tx, rx) = mpsc::unbounded_channel();
    thread::spawn(move || {
        let mut stdin = io::stdin().lock();
        let mut buffer = [0u8; 1024];
        loop {
            match io::Read::read(&mut stdin, &mut buffer) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(buffer[..n].to_vec()).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    shellwise_core::error_log!("stdin read error: {}", e);
                    break;
                }
            }
        }
    });
    rx
}

/// New `(cols, rows)` after each SIGWINCH.
#[cfg(unix)]
fn spawn_resize_watcher() -> Result<mpsc::UnboundedReceiver<(u16, u16)>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut winch = signal(SignalKind::window_change()).context("Failed to watch SIGWINCH")?;
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while winch.recv().await.is_some() {
            if let Ok(size) = crossterm::terminal::size() {
                if tx.send(size).is_err() {
                    break;
                }
            }
        }
    });
    Ok(rx)
}

#[cfg(not(unix))]
fn spawn_resize_watcher() -> Result<mpsc::UnboundedReceiver<(u16, u16)>> {
    let (tx, rx) = mpsc::unbounded_channel();
    // keep the channel open so the select branch stays pending
    std::mem::forget(tx);
    Ok(rx)
}
