//! Terminal session: the engine tying PTY, parser, and screen together.
//!
//! A dedicated reader thread performs blocking reads on a clone of the PTY
//! master and forwards chunks over a channel; [`Session::pump`] drains that
//! channel on the caller's thread, feeds the parser, and notifies the damage
//! listener once per batch. All emulation state is mutated only inside
//! `pump`, so the engine needs no locking.

use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread::{self, JoinHandle};

use tracing::{debug, info};

use crate::config::Config;
use crate::damage::DamageListener;
use crate::input::{self, Key};
use crate::pty::{Pty, PtyError, Result};
use crate::term::{Cell, Cursor, Screen, VtParser};

const READ_CHUNK: usize = 4096;

/// Outcome of one [`Session::pump`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PumpStatus {
    /// All currently available bytes were fed to the parser.
    Drained,
    /// No data was ready; nothing changed.
    Empty,
    /// The child has ended; stop polling.
    Closed,
}

enum ReaderEvent {
    Data(Vec<u8>),
    Eof,
    Error(std::io::Error),
}

/// A live terminal session: one shell, one grid.
pub struct Session {
    pty: Pty,
    parser: VtParser,
    screen: Screen,
    events: Receiver<ReaderEvent>,
    reader_thread: Option<JoinHandle<()>>,
    listener: Option<Box<dyn DamageListener>>,
    closed: bool,
}

impl Session {
    /// Spawn the configured shell on a `rows x cols` pseudoterminal and
    /// start the reader thread.
    pub fn spawn(config: &Config, rows: u16, cols: u16) -> Result<Self> {
        let shell = config.shell();
        let pty = Pty::spawn(&shell, &config.term, rows, cols)?;
        let mut reader = pty.reader()?;

        let (tx, rx) = mpsc::channel();
        let reader_thread = thread::spawn(move || {
            let mut buf = vec![0u8; READ_CHUNK];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => {
                        let _ = tx.send(ReaderEvent::Eof);
                        break;
                    }
                    Ok(n) => {
                        if tx.send(ReaderEvent::Data(buf[..n].to_vec())).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        let _ = tx.send(ReaderEvent::Error(err));
                        break;
                    }
                }
            }
        });

        info!(%shell, rows, cols, "session started");
        Ok(Self {
            pty,
            parser: VtParser::new(),
            screen: Screen::new(rows, cols),
            events: rx,
            reader_thread: Some(reader_thread),
            listener: None,
            closed: false,
        })
    }

    /// Drain all bytes the child has produced since the last call, without
    /// ever blocking. Invoke from a periodic tick.
    ///
    /// Once `Closed` has been returned the session stays closed and no
    /// further damage notifications are produced.
    pub fn pump(&mut self) -> Result<PumpStatus> {
        if self.closed {
            return Ok(PumpStatus::Closed);
        }

        let mut drained = false;
        let mut io_error = None;

        loop {
            match self.events.try_recv() {
                Ok(ReaderEvent::Data(chunk)) => {
                    drained = true;
                    self.feed(&chunk);
                }
                Ok(ReaderEvent::Eof) => {
                    self.closed = true;
                    break;
                }
                Ok(ReaderEvent::Error(err)) => {
                    self.closed = true;
                    if self.pty.has_exited() {
                        // On Linux the master read fails with EIO once the
                        // child side is gone; that is a close, not a fault.
                        debug!("read error after child exit: {err}");
                    } else {
                        io_error = Some(err);
                    }
                    break;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }

        // Bytes processed in this batch still produce one notification,
        // even when the child closed at the end of the stream.
        self.notify_damage();

        if let Some(err) = io_error {
            return Err(PtyError::Read(err));
        }
        if self.closed {
            info!("session closed");
            return Ok(PumpStatus::Closed);
        }
        Ok(if drained {
            PumpStatus::Drained
        } else {
            PumpStatus::Empty
        })
    }

    fn feed(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            if let Some(response) = self.parser.advance(byte, &mut self.screen) {
                if let Err(err) = self.pty.write(&response.to_bytes()) {
                    debug!("dropping terminal response: {err}");
                }
            }
        }
    }

    fn notify_damage(&mut self) {
        if let Some(damage) = self.screen.take_damage() {
            if let Some(listener) = self.listener.as_mut() {
                listener.on_damage(damage);
            }
        }
    }

    /// Register the observer notified after each mutation batch.
    pub fn set_damage_listener(&mut self, listener: impl DamageListener + 'static) {
        self.listener = Some(Box::new(listener));
    }

    /// Forward raw bytes to the child's input.
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.pty.write(bytes)
    }

    /// Encode and send a key press.
    pub fn send_key(&mut self, key: Key) -> Result<()> {
        let bytes = input::encode(key);
        if bytes.is_empty() {
            return Ok(());
        }
        self.pty.write(&bytes)
    }

    /// Resize the grid and the child's window together. The local grid is
    /// updated first so every subsequent write is bounds-safe against the
    /// new dimensions; content is cleared.
    pub fn resize(&mut self, rows: u16, cols: u16) -> Result<()> {
        self.screen.resize(rows, cols);
        self.pty.resize(rows, cols)
    }

    /// Signal forced termination and reap the child. Idempotent.
    pub fn terminate(&mut self) {
        self.pty.terminate();
        self.closed = true;
    }

    pub fn dimensions(&self) -> (u16, u16) {
        self.screen.dimensions()
    }

    pub fn cell(&self, row: u16, col: u16) -> Option<Cell> {
        self.screen.cell(row, col)
    }

    pub fn cursor(&self) -> Cursor {
        self.screen.cursor()
    }

    pub fn title(&self) -> &str {
        self.screen.title()
    }

    /// Read-only view of the whole screen, for renderers that walk the grid.
    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    /// Presentation-only blink phase, driven by the embedder's timer.
    pub fn set_blink_phase(&mut self, phase: bool) {
        self.screen.set_blink_phase(phase);
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn process_id(&self) -> Option<u32> {
        self.pty.process_id()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.terminate();
        // The reader sees EOF once the child is gone and exits on its own.
        if let Some(handle) = self.reader_thread.take() {
            let _ = handle.join();
        }
    }
}
