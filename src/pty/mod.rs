use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::{debug, info, warn};

use crate::error::PtyError;

/// One shell running behind a window
pub struct PtySession {
    master: Box<dyn MasterPty + Send>,
    child: Box<dyn Child + Send + Sync>,
    writer: Box<dyn Write + Send>,
    output_buffer: Arc<Mutex<Vec<u8>>>, // Filled by the reader thread, drained by `read`
    is_alive: Arc<AtomicBool>,          // Cleared when the shell's output hits EOF
}

/// PTY sessions keyed by window id
#[derive(Default)]
pub struct PtyManager {
    sessions: HashMap<String, PtySession>,
}

fn size(cols: u16, rows: u16) -> PtySize {
    PtySize {
        rows: rows.max(1),
        cols: cols.max(1),
        pixel_width: 0,
        pixel_height: 0,
    }
}

impl PtyManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `shell` for `session_id` at `cols` x `rows`. A session that
    /// already exists is left running.
    pub fn spawn(&mut self, session_id: &str, shell: &str, cols: u16, rows: u16) -> Result<(), PtyError> {
        if self.sessions.contains_key(session_id) {
            debug!(session = %session_id, "session already exists");
            return Ok(());
        }

        let pair = native_pty_system()
            .openpty(size(cols, rows))
            .map_err(|e| PtyError::Open(e.to_string()))?;

        let mut cmd = CommandBuilder::new(shell);
        cmd.env("TERM", "xterm-256color");
        if let Ok(cwd) = std::env::current_dir() {
            cmd.cwd(cwd);
        }
        let child = pair.slave.spawn_command(cmd).map_err(|e| PtyError::Spawn {
            shell: shell.to_string(),
            reason: e.to_string(),
        })?;
        // The child holds its own handle to the slave side
        drop(pair.slave);

        let mut reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| PtyError::CloneReader(e.to_string()))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| PtyError::TakeWriter(e.to_string()))?;

        let output_buffer = Arc::new(Mutex::new(Vec::new()));
        let is_alive = Arc::new(AtomicBool::new(true));

        let buffer_clone = Arc::clone(&output_buffer);
        let alive_clone = Arc::clone(&is_alive);
        let thread_session = session_id.to_string();
        thread::spawn(move || {
            let mut buf = [0u8; 4096];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => match buffer_clone.lock() {
                        Ok(mut buffer) => buffer.extend_from_slice(&buf[..n]),
                        Err(_) => break,
                    },
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                    Err(e) => {
                        debug!(session = %thread_session, "PTY read ended: {e}");
                        break;
                    }
                }
            }
            alive_clone.store(false, Ordering::Release);
            debug!(session = %thread_session, "reader thread exiting");
        });

        info!(session = %session_id, %shell, cols, rows, "spawned PTY session");
        self.sessions.insert(
            session_id.to_string(),
            PtySession {
                master: pair.master,
                child,
                writer,
                output_buffer,
                is_alive,
            },
        );
        Ok(())
    }

    fn session(&self, session_id: &str) -> Result<&PtySession, PtyError> {
        self.sessions
            .get(session_id)
            .ok_or_else(|| PtyError::SessionNotFound(session_id.to_string()))
    }

    pub fn write(&mut self, session_id: &str, data: &[u8]) -> Result<(), PtyError> {
        let session = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| PtyError::SessionNotFound(session_id.to_string()))?;
        session.writer.write_all(data)?;
        session.writer.flush()?;
        Ok(())
    }

    /// Take everything the shell wrote since the last call. Never blocks.
    pub fn read(&self, session_id: &str) -> Result<Vec<u8>, PtyError> {
        let session = self.session(session_id)?;
        let mut buffer = session
            .output_buffer
            .lock()
            .map_err(|_| PtyError::Poisoned(session_id.to_string()))?;
        Ok(std::mem::take(&mut *buffer))
    }

    pub fn resize(&self, session_id: &str, cols: u16, rows: u16) -> Result<(), PtyError> {
        self.session(session_id)?
            .master
            .resize(size(cols, rows))
            .map_err(|e| PtyError::Resize(e.to_string()))?;
        debug!(session = %session_id, cols, rows, "resized PTY");
        Ok(())
    }

    /// Kill the shell and drop the session
    pub fn close(&mut self, session_id: &str) -> Result<(), PtyError> {
        let mut session = self
            .sessions
            .remove(session_id)
            .ok_or_else(|| PtyError::SessionNotFound(session_id.to_string()))?;

        if let Err(e) = session.child.kill() {
            // Usually the shell already exited
            debug!(session = %session_id, "kill failed: {e}");
        }
        if let Err(e) = session.child.wait() {
            warn!(session = %session_id, "wait failed: {e}");
        }

        // Dropping the master on Windows crashes inside ConPTY cleanup
        #[cfg(target_os = "windows")]
        std::mem::forget(session.master);

        info!(session = %session_id, "closed PTY session");
        Ok(())
    }

    pub fn has_session(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    /// False once the shell has exited and its output is exhausted
    pub fn is_alive(&self, session_id: &str) -> bool {
        self.sessions
            .get(session_id)
            .is_some_and(|s| s.is_alive.load(Ordering::Acquire))
    }

    pub fn close_all(&mut self) {
        let ids: Vec<String> = self.sessions.keys().cloned().collect();
        for id in ids {
            if let Err(e) = self.close(&id) {
                warn!("{e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_session_errors() {
        let mut manager = PtyManager::new();
        assert!(matches!(
            manager.write("missing", b"ls\n"),
            Err(PtyError::SessionNotFound(id)) if id == "missing"
        ));
        assert!(matches!(manager.read("missing"), Err(PtyError::SessionNotFound(_))));
        assert!(matches!(manager.resize("missing", 80, 24), Err(PtyError::SessionNotFound(_))));
        assert!(matches!(manager.close("missing"), Err(PtyError::SessionNotFound(_))));
        assert!(!manager.has_session("missing"));
        assert!(!manager.is_alive("missing"));
    }
}
