use anyhow::{Context, Result};
use portable_pty::{native_pty_system, CommandBuilder, MasterPty, PtySize};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;
use tokio::sync::mpsc;

pub enum PtyEvent {
    Output(Vec<u8>),
    /// The shell exited; `None` if its status could not be read
    Exit(Option<u32>),
}

pub struct PtyManager {
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
    master: Arc<Mutex<Box<dyn MasterPty + Send>>>,
    pid: Option<u32>,
}

impl PtyManager {
    pub fn new(
        tx: mpsc::UnboundedSender<PtyEvent>,
        shell: &str,
        size: (u16, u16),
        cwd: Option<PathBuf>,
    ) -> Result<Self> {
        let (cols, rows) = size;
        shellwise_core::debug_log!("PtyManager::new: {} at {}x{}, cwd {:?}", shell, cols, rows, cwd);
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .context("Failed to open PTY")?;

        let mut cmd = CommandBuilder::new(shell);
        if let Some(cwd) = cwd {
            cmd.cwd(cwd);
        }
        cmd.env("SHELLWISE", "1");
        #[cfg(unix)]
        cmd.env("TERM", std::env::var("TERM").unwrap_or_else(|_| "xterm-256color".to_string()));

        let mut child = pair
            .slave
            .spawn_command(cmd)
            .context("Failed to spawn shell")?;
        let pid = child.process_id();
        // The slave end belongs to the child now
        drop(pair.slave);

        let mut reader = pair
            .master
            .try_clone_reader()
            .context("Failed to clone PTY reader")?;
        let output_tx = tx.clone();
        thread::spawn(move || {
            let mut buffer = [0u8; 4096];
            loop {
                match std::io::Read::read(&mut reader, &mut buffer) {
                    Ok(0) => {
                        shellwise_core::debug_log!("PTY reader: EOF reached");
                        break;
                    }
                    Ok(n) => {
                        if output_tx.send(PtyEvent::Output(buffer[..n].to_vec())).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        shellwise_core::debug_log!("PTY reader stopped: {}", e);
                        break;
                    }
                }
            }
        });

        thread::spawn(move || {
            let code = match child.wait() {
                Ok(status) => Some(status.exit_code()),
                Err(e) => {
                    shellwise_core::error_log!("waiting for shell failed: {}", e);
                    None
                }
            };
            shellwise_core::info_log!("shell exited with {:?}", code);
            let _ = tx.send(PtyEvent::Exit(code));
        });

        let writer = Arc::new(Mutex::new(
            pair.master.take_writer().context("Failed to take PTY writer")?,
        ));
        let master = Arc::new(Mutex::new(pair.master));

        Ok(Self {
            writer,
            master,
            pid,
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn resize(&self, rows: u16, cols: u16) -> Result<()> {
        shellwise_core::debug_log!("PtyManager::resize: {}x{}", cols, rows);
        let master = self
            .master
            .lock()
            .map_err(|_| anyhow::anyhow!("Failed to lock PTY master"))?;
        master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .context("Failed to resize PTY")?;
        Ok(())
    }

    pub fn write_all(&self, data: &[u8]) -> Result<()> {
        shellwise_core::trace_log!("PtyManager::write_all: {} bytes", data.len());
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow::anyhow!("Failed to lock PTY writer"))?;
        writer.write_all(data).context("Failed to write to PTY")?;
        writer.flush().context("Failed to flush PTY writer")?;
        Ok(())
    }
}

/// The user's login shell, falling back to `/bin/sh`.
pub fn default_shell() -> String {
    if cfg!(target_os = "windows") {
        return "powershell.exe".to_string();
    }
    std::env::var("SHELL")
        .ok()
        .filter(|shell| !shell.is_empty())
        .unwrap_or_else(|| "/bin/sh".to_string())
}

pub fn spawn_pty(
    shell: &str,
    size: (u16, u16),
    cwd: Option<PathBuf>,
) -> Result<(PtyManager, mpsc::UnboundedReceiver<PtyEvent>)> {
    let (tx, rx) = mpsc::unbounded_channel();
    let manager = PtyManager::new(tx, shell, size, cwd)?;
    Ok((manager, rx))
}
