//! Screen state: the cell grid, the cursor, and the current rendition.
//!
//! Every mutation arrives through the parser's dispatch; the display layer
//! only ever reads. Cursor motion funnels through [`Screen::place_cursor`]
//! so bounds clamping lives in exactly one place.

use bitflags::bitflags;
use unicode_width::UnicodeWidthChar;

use crate::damage::{Damage, DamageTracker};

/// Color of a glyph or its background.
///
/// `Default` defers to the renderer's theme-neutral foreground/background
/// pair; indexed values address the conventional 16-entry palette (or the
/// 256-entry extension), RGB carries a direct truecolor value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Color {
    #[default]
    Default,
    Indexed(u8),
    Rgb(u8, u8, u8),
}

bitflags! {
    /// Style bits of a rendition.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct StyleFlags: u8 {
        const BOLD          = 0b0000_0001;
        const DIM           = 0b0000_0010;
        const ITALIC        = 0b0000_0100;
        const UNDERLINE     = 0b0000_1000;
        const BLINK         = 0b0001_0000;
        const INVERSE       = 0b0010_0000;
        const HIDDEN        = 0b0100_0000;
        const STRIKETHROUGH = 0b1000_0000;
    }
}

/// The graphics rendition applied to subsequently written cells.
///
/// Mutated only by SGR sequences; persists across writes until changed or
/// reset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rendition {
    pub fg: Color,
    pub bg: Color,
    pub flags: StyleFlags,
}

impl Rendition {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// One grid position: a glyph and the rendition it was written with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub rendition: Rendition,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            rendition: Rendition::default(),
        }
    }
}

impl Cell {
    /// A blank cell carrying the colors of the given rendition. Erase and
    /// scroll operations expose these so cleared regions keep the active
    /// background.
    fn erased(rendition: &Rendition) -> Self {
        Self {
            ch: ' ',
            rendition: Rendition {
                fg: rendition.fg,
                bg: rendition.bg,
                flags: StyleFlags::empty(),
            },
        }
    }
}

/// Cursor state as seen by the display layer.
///
/// `blink_phase` is presentation metadata toggled by a timer outside the
/// engine; it never influences emulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cursor {
    pub row: u16,
    pub col: u16,
    pub visible: bool,
    pub blink_phase: bool,
}

impl Default for Cursor {
    fn default() -> Self {
        Self {
            row: 0,
            col: 0,
            visible: true,
            blink_phase: true,
        }
    }
}

#[derive(Clone, Copy)]
struct SavedCursor {
    row: u16,
    col: u16,
    rendition: Rendition,
}

/// The addressable character grid.
///
/// Rows are numbered `0..rows` top to bottom, columns `0..cols` left to
/// right. Dimensions are constant between resizes; a resize reallocates the
/// grid and clears it.
pub struct Screen {
    rows: u16,
    cols: u16,
    grid: Vec<Vec<Cell>>,
    cursor: Cursor,
    saved: Option<SavedCursor>,
    pub(crate) rendition: Rendition,
    auto_wrap: bool,
    title: String,
    damage: DamageTracker,
}

impl Screen {
    pub fn new(rows: u16, cols: u16) -> Self {
        let rows = rows.max(1);
        let cols = cols.max(1);
        let mut damage = DamageTracker::default();
        damage.mark_all();
        Self {
            rows,
            cols,
            grid: (0..rows)
                .map(|_| vec![Cell::default(); cols as usize])
                .collect(),
            cursor: Cursor::default(),
            saved: None,
            rendition: Rendition::default(),
            auto_wrap: true,
            title: String::new(),
            damage,
        }
    }

    pub fn dimensions(&self) -> (u16, u16) {
        (self.rows, self.cols)
    }

    pub fn cell(&self, row: u16, col: u16) -> Option<Cell> {
        self.grid
            .get(row as usize)
            .and_then(|cells| cells.get(col as usize))
            .copied()
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn rendition(&self) -> Rendition {
        self.rendition
    }

    /// Drain accumulated damage into a single region.
    pub fn take_damage(&mut self) -> Option<Damage> {
        self.damage.take(self.cols)
    }

    /// Reallocate the grid. Content is cleared; the cursor is clamped into
    /// the new bounds.
    pub fn resize(&mut self, rows: u16, cols: u16) {
        let rows = rows.max(1);
        let cols = cols.max(1);
        self.rows = rows;
        self.cols = cols;
        self.grid = (0..rows)
            .map(|_| vec![Cell::default(); cols as usize])
            .collect();
        self.cursor.row = self.cursor.row.min(rows - 1);
        self.cursor.col = self.cursor.col.min(cols - 1);
        self.damage.mark_all();
    }

    /// Full reset (RIS): blank grid, home cursor, default rendition. The
    /// title survives, as it does in xterm.
    pub(crate) fn reset(&mut self) {
        let title = std::mem::take(&mut self.title);
        *self = Screen::new(self.rows, self.cols);
        self.title = title;
    }

    pub(crate) fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    pub(crate) fn set_auto_wrap(&mut self, enabled: bool) {
        self.auto_wrap = enabled;
    }

    pub(crate) fn set_cursor_visible(&mut self, visible: bool) {
        self.cursor.visible = visible;
        self.damage.mark_line(self.cursor.row);
    }

    /// Presentation-only; flipped by the embedder's blink timer.
    pub fn set_blink_phase(&mut self, phase: bool) {
        self.cursor.blink_phase = phase;
    }

    /// The single clamping point for cursor placement. Both rows touched by
    /// the move are marked damaged so the renderer repaints the cursor cell.
    fn place_cursor(&mut self, row: u16, col: u16) {
        self.damage.mark_line(self.cursor.row);
        self.cursor.row = row.min(self.rows - 1);
        self.cursor.col = col.min(self.cols - 1);
        self.damage.mark_line(self.cursor.row);
    }

    /// Write a glyph at the cursor with the current rendition and advance.
    pub(crate) fn put_char(&mut self, ch: char) {
        // Zero-width code points (combining marks, ZWJ) never occupy a cell.
        if ch.width().unwrap_or(0) == 0 {
            return;
        }
        let (row, col) = (self.cursor.row as usize, self.cursor.col as usize);
        self.grid[row][col] = Cell {
            ch,
            rendition: self.rendition,
        };
        self.damage.mark_line(self.cursor.row);
        self.advance();
    }

    /// Move right one column; past the last column, wrap to the next row,
    /// scrolling when already on the last row.
    pub(crate) fn advance(&mut self) {
        if self.cursor.col + 1 < self.cols {
            self.cursor.col += 1;
        } else if self.auto_wrap {
            self.cursor.col = 0;
            self.linefeed();
        }
    }

    pub(crate) fn carriage_return(&mut self) {
        self.place_cursor(self.cursor.row, 0);
    }

    /// Move down one row, scrolling when on the last row.
    pub(crate) fn linefeed(&mut self) {
        if self.cursor.row + 1 >= self.rows {
            self.scroll_up(1);
        } else {
            self.place_cursor(self.cursor.row + 1, self.cursor.col);
        }
    }

    pub(crate) fn backspace(&mut self) {
        self.place_cursor(self.cursor.row, self.cursor.col.saturating_sub(1));
    }

    /// Advance to the next 8-column tab stop, clamped to the last column.
    pub(crate) fn tab(&mut self) {
        let next = (self.cursor.col / 8 + 1).saturating_mul(8);
        self.place_cursor(self.cursor.row, next);
    }

    pub(crate) fn cursor_up(&mut self, n: u16) {
        self.place_cursor(self.cursor.row.saturating_sub(n), self.cursor.col);
    }

    pub(crate) fn cursor_down(&mut self, n: u16) {
        self.place_cursor(self.cursor.row.saturating_add(n), self.cursor.col);
    }

    pub(crate) fn cursor_forward(&mut self, n: u16) {
        self.place_cursor(self.cursor.row, self.cursor.col.saturating_add(n));
    }

    pub(crate) fn cursor_backward(&mut self, n: u16) {
        self.place_cursor(self.cursor.row, self.cursor.col.saturating_sub(n));
    }

    /// Absolute position, 0-indexed, clamped into bounds.
    pub(crate) fn move_to(&mut self, row: u16, col: u16) {
        self.place_cursor(row, col);
    }

    pub(crate) fn move_to_col(&mut self, col: u16) {
        self.place_cursor(self.cursor.row, col);
    }

    pub(crate) fn move_to_row(&mut self, row: u16) {
        self.place_cursor(row, self.cursor.col);
    }

    pub(crate) fn save_cursor(&mut self) {
        self.saved = Some(SavedCursor {
            row: self.cursor.row,
            col: self.cursor.col,
            rendition: self.rendition,
        });
    }

    pub(crate) fn restore_cursor(&mut self) {
        if let Some(saved) = self.saved {
            self.place_cursor(saved.row, saved.col);
            self.rendition = saved.rendition;
        }
    }

    /// Cursor up one row; at the top, scroll the screen down instead.
    pub(crate) fn reverse_index(&mut self) {
        if self.cursor.row == 0 {
            self.scroll_down(1);
        } else {
            self.place_cursor(self.cursor.row - 1, self.cursor.col);
        }
    }

    /// Shift all rows up by `n`; exposed bottom rows are cleared to the
    /// current background.
    pub(crate) fn scroll_up(&mut self, n: u16) {
        let n = (n.max(1) as usize).min(self.rows as usize);
        for _ in 0..n {
            self.grid.remove(0);
            let blank = self.blank_row();
            self.grid.push(blank);
        }
        self.damage.mark_all();
    }

    /// Shift all rows down by `n`; exposed top rows are cleared.
    pub(crate) fn scroll_down(&mut self, n: u16) {
        let n = (n.max(1) as usize).min(self.rows as usize);
        for _ in 0..n {
            self.grid.pop();
            let blank = self.blank_row();
            self.grid.insert(0, blank);
        }
        self.damage.mark_all();
    }

    /// Erase in display: 0 = cursor to end, 1 = start to cursor, 2 = all.
    /// The cursor does not move.
    pub(crate) fn erase_in_display(&mut self, mode: u16) {
        let row = self.cursor.row as usize;
        match mode {
            0 => {
                self.erase_in_line(0);
                for r in (row + 1)..self.rows as usize {
                    self.clear_row(r);
                }
            }
            1 => {
                for r in 0..row {
                    self.clear_row(r);
                }
                self.erase_in_line(1);
            }
            2 | 3 => {
                for r in 0..self.rows as usize {
                    self.clear_row(r);
                }
            }
            _ => {}
        }
    }

    /// Erase in line: 0 = cursor to end, 1 = start through cursor, 2 = all.
    pub(crate) fn erase_in_line(&mut self, mode: u16) {
        let row = self.cursor.row as usize;
        let col = self.cursor.col as usize;
        let blank = Cell::erased(&self.rendition);
        let cells = &mut self.grid[row];
        match mode {
            0 => {
                for cell in &mut cells[col..] {
                    *cell = blank;
                }
            }
            1 => {
                for cell in &mut cells[..=col] {
                    *cell = blank;
                }
            }
            2 => {
                for cell in cells.iter_mut() {
                    *cell = blank;
                }
            }
            _ => return,
        }
        self.damage.mark_line(self.cursor.row);
    }

    /// Insert `n` blank lines at the cursor row, pushing the rows below off
    /// the bottom.
    pub(crate) fn insert_lines(&mut self, n: u16) {
        let row = self.cursor.row as usize;
        let n = (n.max(1) as usize).min(self.rows as usize - row);
        for _ in 0..n {
            self.grid.pop();
            let blank = self.blank_row();
            self.grid.insert(row, blank);
        }
        self.mark_lines_from(row);
    }

    /// Delete `n` lines at the cursor row, pulling the rows below up.
    pub(crate) fn delete_lines(&mut self, n: u16) {
        let row = self.cursor.row as usize;
        let n = (n.max(1) as usize).min(self.rows as usize - row);
        for _ in 0..n {
            self.grid.remove(row);
            let blank = self.blank_row();
            self.grid.push(blank);
        }
        self.mark_lines_from(row);
    }

    /// Insert `n` blank cells at the cursor, shifting the rest of the line
    /// right.
    pub(crate) fn insert_blanks(&mut self, n: u16) {
        let row = self.cursor.row as usize;
        let col = self.cursor.col as usize;
        let blank = Cell::erased(&self.rendition);
        let n = (n.max(1) as usize).min(self.cols as usize - col);
        for _ in 0..n {
            self.grid[row].pop();
            self.grid[row].insert(col, blank);
        }
        self.damage.mark_line(self.cursor.row);
    }

    /// Delete `n` cells at the cursor, shifting the rest of the line left.
    pub(crate) fn delete_chars(&mut self, n: u16) {
        let row = self.cursor.row as usize;
        let col = self.cursor.col as usize;
        let blank = Cell::erased(&self.rendition);
        let n = (n.max(1) as usize).min(self.cols as usize - col);
        for _ in 0..n {
            self.grid[row].remove(col);
            self.grid[row].push(blank);
        }
        self.damage.mark_line(self.cursor.row);
    }

    /// Erase `n` cells starting at the cursor, without shifting.
    pub(crate) fn erase_chars(&mut self, n: u16) {
        let row = self.cursor.row as usize;
        let col = self.cursor.col as usize;
        let blank = Cell::erased(&self.rendition);
        let end = (col + n.max(1) as usize).min(self.cols as usize);
        for cell in &mut self.grid[row][col..end] {
            *cell = blank;
        }
        self.damage.mark_line(self.cursor.row);
    }

    fn blank_row(&self) -> Vec<Cell> {
        vec![Cell::erased(&self.rendition); self.cols as usize]
    }

    fn clear_row(&mut self, row: usize) {
        let blank = Cell::erased(&self.rendition);
        for cell in &mut self.grid[row] {
            *cell = blank;
        }
        self.damage.mark_line(row as u16);
    }

    fn mark_lines_from(&mut self, row: usize) {
        for r in row..self.rows as usize {
            self.damage.mark_line(r as u16);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row_text(screen: &Screen, row: u16) -> String {
        let (_, cols) = screen.dimensions();
        (0..cols)
            .map(|c| screen.cell(row, c).map(|cell| cell.ch).unwrap_or(' '))
            .collect()
    }

    fn write_str(screen: &mut Screen, s: &str) {
        for ch in s.chars() {
            screen.put_char(ch);
        }
    }

    #[test]
    fn test_put_char_advances_cursor() {
        let mut screen = Screen::new(24, 80);
        write_str(&mut screen, "hi");
        assert_eq!(screen.cell(0, 0).map(|c| c.ch), Some('h'));
        assert_eq!(screen.cell(0, 1).map(|c| c.ch), Some('i'));
        assert_eq!((screen.cursor().row, screen.cursor().col), (0, 2));
    }

    #[test]
    fn test_wrap_at_last_column() {
        let mut screen = Screen::new(24, 10);
        write_str(&mut screen, "0123456789");
        assert_eq!((screen.cursor().row, screen.cursor().col), (1, 0));
        write_str(&mut screen, "x");
        assert_eq!((screen.cursor().row, screen.cursor().col), (1, 1));
        assert_eq!(screen.cell(0, 9).map(|c| c.ch), Some('9'));
        assert_eq!(screen.cell(1, 0).map(|c| c.ch), Some('x'));
    }

    #[test]
    fn test_wrap_on_last_row_scrolls() {
        let mut screen = Screen::new(3, 4);
        write_str(&mut screen, "aaaa");
        screen.carriage_return();
        screen.linefeed();
        write_str(&mut screen, "bbbb");
        // Cursor wrapped onto the last row.
        assert_eq!((screen.cursor().row, screen.cursor().col), (2, 0));
        write_str(&mut screen, "cccc");
        // The wrap past the last row scrolled: "aaaa" is gone.
        assert_eq!(row_text(&screen, 0), "bbbb");
        assert_eq!(row_text(&screen, 1), "cccc");
        assert_eq!(row_text(&screen, 2), "    ");
        assert_eq!((screen.cursor().row, screen.cursor().col), (2, 0));
    }

    #[test]
    fn test_linefeed_at_bottom_scrolls() {
        let mut screen = Screen::new(3, 4);
        write_str(&mut screen, "top");
        screen.move_to(2, 0);
        screen.linefeed();
        assert_eq!(screen.cursor().row, 2);
        assert_eq!(row_text(&screen, 0), "    ");
    }

    #[test]
    fn test_no_wrap_when_auto_wrap_disabled() {
        let mut screen = Screen::new(24, 4);
        screen.set_auto_wrap(false);
        write_str(&mut screen, "abcdef");
        assert_eq!((screen.cursor().row, screen.cursor().col), (0, 3));
        assert_eq!(row_text(&screen, 0), "abcf");
    }

    #[test]
    fn test_cursor_motion_clamps() {
        let mut screen = Screen::new(24, 80);
        screen.move_to(500, 500);
        assert_eq!((screen.cursor().row, screen.cursor().col), (23, 79));
        screen.cursor_up(100);
        assert_eq!(screen.cursor().row, 0);
        screen.cursor_backward(100);
        assert_eq!(screen.cursor().col, 0);
        screen.backspace();
        assert_eq!(screen.cursor().col, 0);
    }

    #[test]
    fn test_tab_advances_to_stop() {
        let mut screen = Screen::new(24, 80);
        screen.tab();
        assert_eq!(screen.cursor().col, 8);
        write_str(&mut screen, "abc");
        screen.tab();
        assert_eq!(screen.cursor().col, 16);
        screen.move_to(0, 79);
        screen.tab();
        assert_eq!(screen.cursor().col, 79);
    }

    #[test]
    fn test_erase_display_keeps_cursor() {
        let mut screen = Screen::new(4, 8);
        write_str(&mut screen, "junkjunk");
        screen.move_to(1, 3);
        screen.erase_in_display(2);
        for r in 0..4 {
            assert_eq!(row_text(&screen, r), "        ");
        }
        assert_eq!((screen.cursor().row, screen.cursor().col), (1, 3));
    }

    #[test]
    fn test_erase_line_modes() {
        let mut screen = Screen::new(2, 6);
        write_str(&mut screen, "abcdef");
        screen.move_to(0, 2);
        screen.erase_in_line(0);
        assert_eq!(row_text(&screen, 0), "ab    ");

        write_str(&mut screen, "cdef");
        screen.move_to(0, 2);
        screen.erase_in_line(1);
        assert_eq!(row_text(&screen, 0), "   def");
    }

    #[test]
    fn test_erased_cells_keep_background() {
        let mut screen = Screen::new(2, 4);
        screen.rendition.bg = Color::Indexed(4);
        screen.erase_in_line(2);
        let cell = screen.cell(0, 0).unwrap();
        assert_eq!(cell.rendition.bg, Color::Indexed(4));
        assert_eq!(cell.ch, ' ');
    }

    #[test]
    fn test_scroll_down_exposes_blank_top() {
        let mut screen = Screen::new(3, 4);
        write_str(&mut screen, "top");
        screen.scroll_down(1);
        assert_eq!(row_text(&screen, 0), "    ");
        assert_eq!(row_text(&screen, 1), "top ");
    }

    #[test]
    fn test_reverse_index_at_top_scrolls() {
        let mut screen = Screen::new(3, 4);
        write_str(&mut screen, "top");
        screen.move_to(0, 0);
        screen.reverse_index();
        assert_eq!(screen.cursor().row, 0);
        assert_eq!(row_text(&screen, 1), "top ");
    }

    #[test]
    fn test_insert_and_delete_lines() {
        let mut screen = Screen::new(3, 3);
        write_str(&mut screen, "aaa");
        screen.move_to(1, 0);
        write_str(&mut screen, "bbb");
        screen.move_to(0, 0);
        screen.insert_lines(1);
        assert_eq!(row_text(&screen, 0), "   ");
        assert_eq!(row_text(&screen, 1), "aaa");
        assert_eq!(row_text(&screen, 2), "bbb");
        screen.delete_lines(2);
        assert_eq!(row_text(&screen, 0), "bbb");
        assert_eq!(row_text(&screen, 1), "   ");
    }

    #[test]
    fn test_insert_and_delete_chars() {
        let mut screen = Screen::new(2, 6);
        write_str(&mut screen, "abcdef");
        screen.move_to(0, 1);
        screen.insert_blanks(2);
        assert_eq!(row_text(&screen, 0), "a  bcd");
        screen.delete_chars(2);
        assert_eq!(row_text(&screen, 0), "abcd  ");
    }

    #[test]
    fn test_erase_chars_in_place() {
        let mut screen = Screen::new(2, 6);
        write_str(&mut screen, "abcdef");
        screen.move_to(0, 2);
        screen.erase_chars(3);
        assert_eq!(row_text(&screen, 0), "ab   f");
    }

    #[test]
    fn test_resize_clears_and_redimensions() {
        let mut screen = Screen::new(24, 80);
        write_str(&mut screen, "content");
        screen.resize(40, 120);
        assert_eq!(screen.dimensions(), (40, 120));
        for row in 0..40 {
            for col in 0..120 {
                assert_eq!(screen.cell(row, col), Some(Cell::default()));
            }
        }
        assert!(screen.cell(40, 0).is_none());
    }

    #[test]
    fn test_resize_clamps_cursor() {
        let mut screen = Screen::new(24, 80);
        screen.move_to(23, 79);
        screen.resize(10, 10);
        assert_eq!((screen.cursor().row, screen.cursor().col), (9, 9));
    }

    #[test]
    fn test_save_restore_cursor_and_rendition() {
        let mut screen = Screen::new(24, 80);
        screen.rendition.fg = Color::Indexed(2);
        screen.move_to(5, 6);
        screen.save_cursor();
        screen.move_to(0, 0);
        screen.rendition.reset();
        screen.restore_cursor();
        assert_eq!((screen.cursor().row, screen.cursor().col), (5, 6));
        assert_eq!(screen.rendition().fg, Color::Indexed(2));
    }

    #[test]
    fn test_reset_keeps_title() {
        let mut screen = Screen::new(4, 4);
        write_str(&mut screen, "junk");
        screen.set_title("shell");
        screen.reset();
        assert_eq!(row_text(&screen, 0), "    ");
        assert_eq!((screen.cursor().row, screen.cursor().col), (0, 0));
        assert_eq!(screen.title(), "shell");
    }

    #[test]
    fn test_zero_width_char_occupies_no_cell() {
        let mut screen = Screen::new(1, 4);
        screen.put_char('a');
        screen.put_char('\u{0301}'); // combining acute
        assert_eq!((screen.cursor().row, screen.cursor().col), (0, 1));
        assert_eq!(screen.cell(0, 1).map(|c| c.ch), Some(' '));
    }

    #[test]
    fn test_damage_tracks_touched_lines() {
        let mut screen = Screen::new(24, 80);
        // Initial damage is a full repaint.
        assert_eq!(screen.take_damage(), Some(Damage::Full));
        assert_eq!(screen.take_damage(), None);

        screen.move_to(4, 0);
        screen.put_char('x');
        match screen.take_damage() {
            Some(Damage::Rect { top, bottom, .. }) => {
                assert!(top <= 4 && bottom >= 4);
            }
            other => panic!("expected rect damage, got {other:?}"),
        }
    }

    #[test]
    fn test_scroll_damages_everything() {
        let mut screen = Screen::new(3, 3);
        let _ = screen.take_damage();
        screen.scroll_up(1);
        assert_eq!(screen.take_damage(), Some(Damage::Full));
    }
}
