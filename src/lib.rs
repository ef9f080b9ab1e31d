//! vtgrid - an embeddable ANSI/VT terminal emulation engine.
//!
//! vtgrid owns a shell process behind a pseudoterminal, interprets the byte
//! stream the shell emits, and maintains an addressable character grid that a
//! display layer of your choosing renders. The crate knows nothing about
//! fonts, windows, or input toolkits; it exposes the grid, the cursor, and a
//! damage observer, and leaves painting to the embedder.
//!
//! # Architecture
//!
//! ```text
//! Session
//! ├── Pty (shell process behind a pseudoterminal)
//! ├── reader thread ──▶ channel ──▶ pump()
//! └── VtParser ──▶ Screen
//!     ├── grid of Cells (glyph + rendition)
//!     ├── Cursor (position + visibility)
//!     └── damage accumulation ──▶ DamageListener
//! ```
//!
//! All emulation state mutates only inside [`Session::pump`], on the caller's
//! thread. `pump` never blocks; drive it from a periodic tick (10 ms is
//! plenty for interactive latency).
//!
//! # Quick start
//!
//! ```no_run
//! use vtgrid::{Config, PumpStatus, Session};
//!
//! let config = Config::load();
//! let mut session = Session::spawn(&config, 24, 80)?;
//! session.set_damage_listener(|damage| {
//!     // schedule a repaint of the damaged region
//!     let _ = damage;
//! });
//!
//! loop {
//!     if let PumpStatus::Closed = session.pump()? {
//!         break;
//!     }
//!     std::thread::sleep(std::time::Duration::from_millis(10));
//! }
//! # Ok::<(), vtgrid::PtyError>(())
//! ```

pub mod config;
pub mod damage;
pub mod input;
pub mod pty;
pub mod session;
pub mod term;

pub use config::Config;
pub use damage::{Damage, DamageListener};
pub use input::Key;
pub use pty::{Pty, PtyError};
pub use session::{PumpStatus, Session};
pub use term::{Cell, Color, Cursor, Rendition, Screen, StyleFlags, VtParser};
