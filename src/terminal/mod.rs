//! Interactive runtime: one shell in a PTY with the session engine in front of it

pub mod event_loop;
pub mod input;
pub mod pty;
pub mod screen;

use anyhow::{Context, Result};
use crossterm::{
    event::{DisableBracketedPaste, EnableBracketedPaste},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode},
};
use shellwise_core::llm::ChatTransport;
use shellwise_core::{Config, Engine, ShellwiseError};
use std::io;
use std::sync::Arc;

use self::event_loop::EventLoop;
use self::input::InputSplitter;
use self::screen::Screen;

/// RAII guard that restores the terminal on drop
pub struct TerminalGuard;

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = execute!(io::stdout(), DisableBracketedPaste);
        let _ = disable_raw_mode();
    }
}

/// Raw mode with bracketed paste. The shell keeps the normal screen.
pub fn init_terminal() -> Result<TerminalGuard> {
    enable_raw_mode().context("Failed to enable raw mode")?;
    let guard = TerminalGuard;
    execute!(io::stdout(), EnableBracketedPaste).context("Failed to enable bracketed paste")?;
    Ok(guard)
}

/// Run until the shell exits. Returns the shell's exit code.
pub async fn run(config: &Config, transport: Arc<dyn ChatTransport>, shell: &str) -> Result<i32> {
    let trigger = config
        .session
        .trigger_byte()
        .ok_or_else(|| ShellwiseError::InvalidConfig {
            message: "session.trigger_key must be a letter".to_string(),
        })?;
    let (cols, rows) = crossterm::terminal::size().unwrap_or((80, 24));
    let launch_dir = std::env::current_dir().context("Failed to read the current directory")?;

    let (pty, pty_rx) = pty::spawn_pty(shell, (cols, rows), Some(launch_dir.clone()))?;
    let (mut engine, gateway_rx) = Engine::from_config(config, transport);
    let session = engine.create_session();
    shellwise_core::info_log!(
        "started {} (pid {:?}) for session {}, trigger byte {:#04x}",
        shell,
        pty.pid(),
        session.short(),
        trigger
    );

    let _guard = init_terminal()?;
    let event_loop = EventLoop::new(
        engine,
        session,
        pty,
        Screen::new(rows, cols),
        InputSplitter::new(trigger),
        launch_dir,
    );
    let code = event_loop.run(pty_rx, gateway_rx).await?;
    Ok(code.map(|c| c as i32).unwrap_or(1))
}
