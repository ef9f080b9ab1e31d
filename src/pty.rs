//! Pseudoterminal ownership.
//!
//! Spawns the shell behind a pseudoterminal pair and keeps the master side:
//! input writes, window-size updates, and child termination all go through
//! here. One [`Pty`] per session; never shared.

use std::io::{self, Read, Write};

use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum PtyError {
    #[error("failed to open pseudoterminal: {0}")]
    Open(#[source] anyhow::Error),

    #[error("failed to spawn shell: {0}")]
    Spawn(#[source] anyhow::Error),

    #[error("failed to resize pseudoterminal: {0}")]
    Resize(#[source] anyhow::Error),

    #[error("failed to write to child: {0}")]
    Write(#[source] io::Error),

    #[error("failed to read from child: {0}")]
    Read(#[source] io::Error),
}

pub type Result<T> = std::result::Result<T, PtyError>;

/// The master side of a pseudoterminal with a shell attached.
pub struct Pty {
    master: Box<dyn MasterPty + Send>,
    writer: Box<dyn Write + Send>,
    child: Box<dyn Child + Send + Sync>,
    terminated: bool,
}

impl Pty {
    /// Open a pseudoterminal sized `rows x cols` and spawn `shell` on the
    /// slave side with `TERM=<term>` exported. A failed spawn is fatal to
    /// the session; there is no retry.
    pub fn spawn(shell: &str, term: &str, rows: u16, cols: u16) -> Result<Self> {
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(PtyError::Open)?;

        let mut cmd = CommandBuilder::new(shell);
        cmd.env("TERM", term);

        let child = pair.slave.spawn_command(cmd).map_err(PtyError::Spawn)?;
        // Drop the slave after spawning so the master sees EOF when the
        // child exits.
        drop(pair.slave);

        let writer = pair.master.take_writer().map_err(PtyError::Open)?;

        Ok(Self {
            master: pair.master,
            writer,
            child,
            terminated: false,
        })
    }

    /// Clone a reader for the session's reader thread.
    pub fn reader(&self) -> Result<Box<dyn Read + Send>> {
        self.master.try_clone_reader().map_err(PtyError::Open)
    }

    /// Forward raw bytes to the child's input.
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes).map_err(PtyError::Write)?;
        self.writer.flush().map_err(PtyError::Write)
    }

    /// Update the kernel window-size association; the PTY layer signals the
    /// child that its controlling window changed.
    pub fn resize(&mut self, rows: u16, cols: u16) -> Result<()> {
        self.master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(PtyError::Resize)
    }

    /// The child's process id, while the platform exposes one.
    pub fn process_id(&self) -> Option<u32> {
        self.child.process_id()
    }

    /// Check whether the child has exited without blocking.
    pub fn has_exited(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(Some(_)))
    }

    /// Kill and reap the child. Idempotent, and safe to call after the
    /// child already exited on its own.
    pub fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;

        if let Ok(Some(status)) = self.child.try_wait() {
            debug!(?status, "child already exited");
            return;
        }
        if let Err(err) = self.child.kill() {
            debug!("kill failed (child likely gone): {err}");
        }
        let _ = self.child.wait();
    }
}

impl Drop for Pty {
    fn drop(&mut self) {
        self.terminate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(unix)]
    fn test_pty_spawn() {
        let pty = Pty::spawn("/bin/sh", "xterm-256color", 24, 80);
        assert!(pty.is_ok());
    }

    #[test]
    #[cfg(unix)]
    fn test_terminate_idempotent() {
        let mut pty = Pty::spawn("/bin/sh", "xterm-256color", 24, 80).expect("spawn shell");
        pty.terminate();
        pty.terminate();
    }
}
