//! ANSI/VT escape sequence parser.
//!
//! A byte-driven state machine feeding decoded operations into a [`Screen`].
//! All in-flight accumulation (partial escape sequences, partial UTF-8 code
//! points) lives in the parser instance, so a sequence split across two reads
//! resumes exactly where it left off, and multiple engine instances never
//! interfere.

use tracing::debug;

use super::screen::{Color, Screen, StyleFlags};

/// Longest escape/CSI sequence accepted before it is declared malformed and
/// discarded. Bounds memory growth from hostile or corrupted streams.
const MAX_SEQUENCE_LEN: usize = 64;

/// OSC strings beyond this length are truncated (but still consumed up to
/// their terminator).
const MAX_OSC_LEN: usize = 1024;

/// Response that needs to be written back to the child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Cursor position report: ESC [ row ; col R (1-indexed).
    CursorPosition(u16, u16),
    /// Device status report: terminal OK.
    Status,
    /// Primary device attributes.
    DeviceAttributes,
    /// Secondary device attributes.
    SecondaryDeviceAttributes,
}

impl Response {
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Response::CursorPosition(row, col) => format!("\x1b[{};{}R", row, col).into_bytes(),
            Response::Status => b"\x1b[0n".to_vec(),
            Response::DeviceAttributes => b"\x1b[?62;c".to_vec(),
            Response::SecondaryDeviceAttributes => b"\x1b[>1;10;0c".to_vec(),
        }
    }
}

#[derive(Clone, Copy, Default, PartialEq)]
enum ParserState {
    #[default]
    Ground,
    Escape,
    EscapeIntermediate,
    CsiEntry,
    CsiParam,
    CsiIntermediate,
    OscString,
    /// ESC received within an OSC string, waiting for the ST backslash.
    OscEsc,
}

/// Parser state machine.
pub struct VtParser {
    state: ParserState,
    params: Vec<u16>,
    current_param: Option<u16>,
    intermediates: Vec<u8>,
    osc: String,
    /// Bytes accumulated since the sequence started, for the overflow bound.
    seq_len: usize,
    utf8_buf: [u8; 4],
    utf8_len: u8,
    utf8_need: u8,
}

impl Default for VtParser {
    fn default() -> Self {
        Self::new()
    }
}

impl VtParser {
    pub fn new() -> Self {
        Self {
            state: ParserState::Ground,
            params: Vec::with_capacity(16),
            current_param: None,
            intermediates: Vec::with_capacity(4),
            osc: String::new(),
            seq_len: 0,
            utf8_buf: [0; 4],
            utf8_len: 0,
            utf8_need: 0,
        }
    }

    /// Feed a single byte, mutating the screen and occasionally producing a
    /// response to write back to the child.
    pub fn advance(&mut self, byte: u8, screen: &mut Screen) -> Option<Response> {
        // C0 controls act immediately in every state except inside OSC
        // strings, where BEL and ESC participate in termination.
        if byte < 0x20
            && !matches!(self.state, ParserState::OscString | ParserState::OscEsc)
        {
            self.execute_c0(byte, screen);
            return None;
        }

        // OSC strings are exempt from the sequence bound: they are consumed
        // to their terminator and truncated at their own limit instead.
        if !matches!(
            self.state,
            ParserState::Ground | ParserState::OscString | ParserState::OscEsc
        ) {
            self.seq_len += 1;
            if self.seq_len > MAX_SEQUENCE_LEN {
                debug!("discarding oversized escape sequence");
                self.reset_to_ground();
                return None;
            }
        }

        match self.state {
            ParserState::Ground => {
                self.ground(byte, screen);
                None
            }
            ParserState::Escape => self.escape(byte, screen),
            ParserState::EscapeIntermediate => {
                self.escape_intermediate(byte);
                None
            }
            ParserState::CsiEntry => self.csi_entry(byte, screen),
            ParserState::CsiParam => self.csi_param(byte, screen),
            ParserState::CsiIntermediate => self.csi_intermediate(byte, screen),
            ParserState::OscString => {
                self.osc_string(byte, screen);
                None
            }
            ParserState::OscEsc => self.osc_esc(byte, screen),
        }
    }

    fn execute_c0(&mut self, byte: u8, screen: &mut Screen) {
        match byte {
            0x1B => self.enter_escape(),
            0x07 => {} // BEL
            0x08 => screen.backspace(),
            0x09 => screen.tab(),
            0x0A | 0x0B | 0x0C => screen.linefeed(),
            0x0D => screen.carriage_return(),
            _ => {}
        }
    }

    fn enter_escape(&mut self) {
        self.state = ParserState::Escape;
        self.params.clear();
        self.intermediates.clear();
        self.current_param = None;
        self.seq_len = 0;
        self.utf8_len = 0;
        self.utf8_need = 0;
    }

    fn reset_to_ground(&mut self) {
        self.state = ParserState::Ground;
        self.params.clear();
        self.intermediates.clear();
        self.current_param = None;
        self.seq_len = 0;
    }

    fn ground(&mut self, byte: u8, screen: &mut Screen) {
        if self.utf8_need > 0 {
            if byte & 0xC0 == 0x80 {
                self.utf8_buf[self.utf8_len as usize] = byte;
                self.utf8_len += 1;
                if self.utf8_len == self.utf8_need {
                    if let Ok(s) = std::str::from_utf8(&self.utf8_buf[..self.utf8_len as usize]) {
                        if let Some(ch) = s.chars().next() {
                            screen.put_char(ch);
                        }
                    }
                    self.utf8_len = 0;
                    self.utf8_need = 0;
                }
                return;
            }
            // Broken continuation: drop the partial code point and fall
            // through to handle this byte on its own.
            self.utf8_len = 0;
            self.utf8_need = 0;
        }

        match byte {
            0x20..=0x7E => screen.put_char(byte as char),
            0x7F => screen.backspace(),
            0xC2..=0xDF => self.begin_utf8(byte, 2),
            0xE0..=0xEF => self.begin_utf8(byte, 3),
            0xF0..=0xF4 => self.begin_utf8(byte, 4),
            _ => {} // stray continuation or invalid lead byte
        }
    }

    fn begin_utf8(&mut self, byte: u8, need: u8) {
        self.utf8_buf[0] = byte;
        self.utf8_len = 1;
        self.utf8_need = need;
    }

    fn escape(&mut self, byte: u8, screen: &mut Screen) -> Option<Response> {
        match byte {
            b'[' => {
                self.state = ParserState::CsiEntry;
                self.params.clear();
                self.intermediates.clear();
                self.current_param = None;
            }
            b']' => {
                self.state = ParserState::OscString;
                self.osc.clear();
            }
            b'7' => {
                // DECSC
                screen.save_cursor();
                self.state = ParserState::Ground;
            }
            b'8' => {
                // DECRC
                screen.restore_cursor();
                self.state = ParserState::Ground;
            }
            b'D' => {
                // IND
                screen.linefeed();
                self.state = ParserState::Ground;
            }
            b'E' => {
                // NEL
                screen.carriage_return();
                screen.linefeed();
                self.state = ParserState::Ground;
            }
            b'M' => {
                // RI
                screen.reverse_index();
                self.state = ParserState::Ground;
            }
            b'c' => {
                // RIS
                screen.reset();
                self.state = ParserState::Ground;
            }
            0x20..=0x2F => {
                self.intermediates.push(byte);
                self.state = ParserState::EscapeIntermediate;
            }
            _ => {
                // Unsupported short sequence, discarded.
                self.state = ParserState::Ground;
            }
        }
        None
    }

    fn escape_intermediate(&mut self, byte: u8) {
        match byte {
            0x20..=0x2F => {
                self.intermediates.push(byte);
            }
            _ => {
                // Final byte; charset selections and the like are ignored.
                self.state = ParserState::Ground;
            }
        }
    }

    fn csi_entry(&mut self, byte: u8, screen: &mut Screen) -> Option<Response> {
        match byte {
            b'0'..=b'9' => {
                self.current_param = Some((byte - b'0') as u16);
                self.state = ParserState::CsiParam;
            }
            b';' => {
                self.params.push(0);
                self.state = ParserState::CsiParam;
            }
            b'?' | b'>' | b'!' | b'=' => {
                self.intermediates.push(byte);
            }
            0x20..=0x2F => {
                self.intermediates.push(byte);
                self.state = ParserState::CsiIntermediate;
            }
            0x40..=0x7E => {
                return self.execute_csi(byte, screen);
            }
            _ => {
                self.reset_to_ground();
            }
        }
        None
    }

    fn csi_param(&mut self, byte: u8, screen: &mut Screen) -> Option<Response> {
        match byte {
            b'0'..=b'9' => {
                let digit = (byte - b'0') as u16;
                self.current_param = Some(
                    self.current_param
                        .unwrap_or(0)
                        .saturating_mul(10)
                        .saturating_add(digit),
                );
            }
            b';' | b':' => {
                self.params.push(self.current_param.take().unwrap_or(0));
            }
            0x20..=0x2F => {
                if let Some(p) = self.current_param.take() {
                    self.params.push(p);
                }
                self.intermediates.push(byte);
                self.state = ParserState::CsiIntermediate;
            }
            0x40..=0x7E => {
                if let Some(p) = self.current_param.take() {
                    self.params.push(p);
                }
                return self.execute_csi(byte, screen);
            }
            _ => {
                self.reset_to_ground();
            }
        }
        None
    }

    fn csi_intermediate(&mut self, byte: u8, screen: &mut Screen) -> Option<Response> {
        match byte {
            0x20..=0x2F => {
                self.intermediates.push(byte);
            }
            0x40..=0x7E => {
                return self.execute_csi(byte, screen);
            }
            _ => {
                self.reset_to_ground();
            }
        }
        None
    }

    fn osc_string(&mut self, byte: u8, screen: &mut Screen) {
        match byte {
            0x07 => {
                // BEL terminates OSC.
                self.execute_osc(screen);
                self.reset_to_ground();
            }
            0x1B => {
                self.state = ParserState::OscEsc;
            }
            0x9C => {
                // 8-bit ST.
                self.execute_osc(screen);
                self.reset_to_ground();
            }
            _ => {
                if self.osc.len() < MAX_OSC_LEN {
                    self.osc.push(byte as char);
                }
            }
        }
    }

    fn osc_esc(&mut self, byte: u8, screen: &mut Screen) -> Option<Response> {
        if byte == b'\\' {
            // ST (ESC \).
            self.execute_osc(screen);
            self.reset_to_ground();
            None
        } else {
            // Not ST; run the OSC and treat this byte as a fresh escape.
            self.execute_osc(screen);
            self.enter_escape();
            self.escape(byte, screen)
        }
    }

    fn execute_osc(&mut self, screen: &mut Screen) {
        if let Some(pos) = self.osc.find(';') {
            let code = &self.osc[..pos];
            let text = &self.osc[pos + 1..];
            match code {
                "0" | "1" | "2" => screen.set_title(text),
                _ => debug!(code, "ignoring OSC"),
            }
        }
        self.osc.clear();
    }

    fn execute_csi(&mut self, final_byte: u8, screen: &mut Screen) -> Option<Response> {
        let is_private = self.intermediates.contains(&b'?');
        let is_gt = self.intermediates.contains(&b'>');
        let params = &self.params;

        let response = match (is_private, is_gt, final_byte) {
            // Cursor movement
            (false, false, b'A') => {
                screen.cursor_up(params.first().copied().unwrap_or(1).max(1));
                None
            }
            (false, false, b'B') => {
                screen.cursor_down(params.first().copied().unwrap_or(1).max(1));
                None
            }
            (false, false, b'C') => {
                screen.cursor_forward(params.first().copied().unwrap_or(1).max(1));
                None
            }
            (false, false, b'D') => {
                screen.cursor_backward(params.first().copied().unwrap_or(1).max(1));
                None
            }
            (false, false, b'E') => {
                // CNL
                screen.cursor_down(params.first().copied().unwrap_or(1).max(1));
                screen.carriage_return();
                None
            }
            (false, false, b'F') => {
                // CPL
                screen.cursor_up(params.first().copied().unwrap_or(1).max(1));
                screen.carriage_return();
                None
            }
            (false, false, b'G') => {
                // CHA
                let col = params.first().copied().unwrap_or(1).max(1);
                screen.move_to_col(col - 1);
                None
            }
            (false, false, b'd') => {
                // VPA
                let row = params.first().copied().unwrap_or(1).max(1);
                screen.move_to_row(row - 1);
                None
            }
            (false, false, b'H') | (false, false, b'f') => {
                // CUP; parameters are 1-indexed.
                let row = params.first().copied().unwrap_or(1).max(1);
                let col = params.get(1).copied().unwrap_or(1).max(1);
                screen.move_to(row - 1, col - 1);
                None
            }

            // Erase
            (false, false, b'J') => {
                screen.erase_in_display(params.first().copied().unwrap_or(0));
                None
            }
            (false, false, b'K') => {
                screen.erase_in_line(params.first().copied().unwrap_or(0));
                None
            }

            // Line operations
            (false, false, b'L') => {
                screen.insert_lines(params.first().copied().unwrap_or(1).max(1));
                None
            }
            (false, false, b'M') => {
                screen.delete_lines(params.first().copied().unwrap_or(1).max(1));
                None
            }

            // Character operations
            (false, false, b'@') => {
                screen.insert_blanks(params.first().copied().unwrap_or(1).max(1));
                None
            }
            (false, false, b'P') => {
                screen.delete_chars(params.first().copied().unwrap_or(1).max(1));
                None
            }
            (false, false, b'X') => {
                screen.erase_chars(params.first().copied().unwrap_or(1).max(1));
                None
            }

            // Scroll
            (false, false, b'S') => {
                screen.scroll_up(params.first().copied().unwrap_or(1).max(1));
                None
            }
            (false, false, b'T') => {
                screen.scroll_down(params.first().copied().unwrap_or(1).max(1));
                None
            }

            // SGR
            (false, false, b'm') => {
                self.execute_sgr(screen);
                None
            }

            // Save/restore cursor
            (false, false, b's') => {
                screen.save_cursor();
                None
            }
            (false, false, b'u') => {
                screen.restore_cursor();
                None
            }

            // Device status report
            (false, false, b'n') => match params.first() {
                Some(5) => Some(Response::Status),
                Some(6) => {
                    let cursor = screen.cursor();
                    Some(Response::CursorPosition(cursor.row + 1, cursor.col + 1))
                }
                _ => None,
            },

            // Device attributes
            (false, false, b'c') => Some(Response::DeviceAttributes),
            (false, true, b'c') => Some(Response::SecondaryDeviceAttributes),

            // DEC private modes
            (true, false, b'h') | (true, false, b'l') => {
                let enable = final_byte == b'h';
                for &p in params {
                    match p {
                        7 => screen.set_auto_wrap(enable),
                        25 => screen.set_cursor_visible(enable),
                        _ => debug!(mode = p, enable, "ignoring private mode"),
                    }
                }
                None
            }

            _ => {
                // Unknown sequences are swallowed, never echoed as glyphs.
                debug!(
                    "unknown CSI: intermediates={:?}, params={:?}, final={:?}",
                    self.intermediates, params, final_byte as char
                );
                None
            }
        };

        self.reset_to_ground();
        response
    }

    /// Apply every parameter of an SGR sequence to the current rendition.
    fn execute_sgr(&self, screen: &mut Screen) {
        if self.params.is_empty() {
            screen.rendition.reset();
            return;
        }

        let mut iter = self.params.iter();
        while let Some(&param) = iter.next() {
            match param {
                0 => screen.rendition.reset(),
                1 => screen.rendition.flags |= StyleFlags::BOLD,
                2 => screen.rendition.flags |= StyleFlags::DIM,
                3 => screen.rendition.flags |= StyleFlags::ITALIC,
                4 => screen.rendition.flags |= StyleFlags::UNDERLINE,
                5 => screen.rendition.flags |= StyleFlags::BLINK,
                7 => screen.rendition.flags |= StyleFlags::INVERSE,
                8 => screen.rendition.flags |= StyleFlags::HIDDEN,
                9 => screen.rendition.flags |= StyleFlags::STRIKETHROUGH,

                22 => screen.rendition.flags &= !(StyleFlags::BOLD | StyleFlags::DIM),
                23 => screen.rendition.flags &= !StyleFlags::ITALIC,
                24 => screen.rendition.flags &= !StyleFlags::UNDERLINE,
                25 => screen.rendition.flags &= !StyleFlags::BLINK,
                27 => screen.rendition.flags &= !StyleFlags::INVERSE,
                28 => screen.rendition.flags &= !StyleFlags::HIDDEN,
                29 => screen.rendition.flags &= !StyleFlags::STRIKETHROUGH,

                30..=37 => screen.rendition.fg = Color::Indexed((param - 30) as u8),
                38 => {
                    if let Some(color) = Self::extended_color(&mut iter) {
                        screen.rendition.fg = color;
                    }
                }
                39 => screen.rendition.fg = Color::Default,

                40..=47 => screen.rendition.bg = Color::Indexed((param - 40) as u8),
                48 => {
                    if let Some(color) = Self::extended_color(&mut iter) {
                        screen.rendition.bg = color;
                    }
                }
                49 => screen.rendition.bg = Color::Default,

                90..=97 => screen.rendition.fg = Color::Indexed((param - 90 + 8) as u8),
                100..=107 => screen.rendition.bg = Color::Indexed((param - 100 + 8) as u8),

                _ => {}
            }
        }
    }

    /// Decode the 38/48 extended color forms: `5;n` (256-color) and
    /// `2;r;g;b` (direct RGB).
    fn extended_color<'a>(iter: &mut impl Iterator<Item = &'a u16>) -> Option<Color> {
        match iter.next() {
            Some(&5) => iter.next().map(|&n| Color::Indexed(n.min(255) as u8)),
            Some(&2) => {
                let r = iter.next().copied().unwrap_or(0).min(255) as u8;
                let g = iter.next().copied().unwrap_or(0).min(255) as u8;
                let b = iter.next().copied().unwrap_or(0).min(255) as u8;
                Some(Color::Rgb(r, g, b))
            }
            _ => None,
        }
    }
}
