//! Damage regions and the observer interface.
//!
//! The screen records which lines changed while the parser applies a batch of
//! operations; the session converts the accumulated set into a single
//! [`Damage`] value and hands it to the registered listener. The engine holds
//! no knowledge of how the grid is painted.

use std::collections::HashSet;

/// A region of the grid that changed since the last notification.
///
/// Coordinates are 0-indexed and inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Damage {
    /// Every cell may have changed.
    Full,
    /// A bounded dirty rectangle.
    Rect {
        top: u16,
        left: u16,
        bottom: u16,
        right: u16,
    },
}

/// Observer invoked once after each batch of screen mutations.
///
/// Implemented for closures, so a renderer can register
/// `session.set_damage_listener(|damage| ...)` directly.
pub trait DamageListener {
    fn on_damage(&mut self, damage: Damage);
}

impl<F: FnMut(Damage)> DamageListener for F {
    fn on_damage(&mut self, damage: Damage) {
        self(damage)
    }
}

/// Accumulates dirty lines between notifications.
#[derive(Default)]
pub(crate) struct DamageTracker {
    lines: HashSet<u16>,
    full: bool,
}

impl DamageTracker {
    pub fn mark_line(&mut self, row: u16) {
        if !self.full {
            self.lines.insert(row);
        }
    }

    pub fn mark_all(&mut self) {
        self.full = true;
        self.lines.clear();
    }

    /// Drain accumulated damage into a single region spanning the dirty
    /// lines at full width, or `None` when nothing changed.
    pub fn take(&mut self, cols: u16) -> Option<Damage> {
        if self.full {
            self.full = false;
            return Some(Damage::Full);
        }
        if self.lines.is_empty() {
            return None;
        }
        let top = self.lines.iter().copied().min().unwrap_or(0);
        let bottom = self.lines.iter().copied().max().unwrap_or(0);
        self.lines.clear();
        Some(Damage::Rect {
            top,
            left: 0,
            bottom,
            right: cols.saturating_sub(1),
        })
    }
}
