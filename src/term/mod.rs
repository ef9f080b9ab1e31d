//! Terminal emulation: escape-sequence parsing and screen state.
//!
//! - **parser**: byte-driven ANSI/VT state machine
//! - **screen**: cell grid, cursor, and rendition state

pub mod parser;
pub mod screen;

pub use parser::{Response, VtParser};
pub use screen::{Cell, Color, Cursor, Rendition, Screen, StyleFlags};
