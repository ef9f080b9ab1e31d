//! Key-to-byte encoding for child input.
//!
//! The engine does not know any input toolkit; the embedder translates its
//! native key events into [`Key`] values and the encodings here produce the
//! exact byte sequences an xterm-compatible application expects.

/// A decoded key press, independent of any input toolkit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    /// A printable character, sent as UTF-8.
    Char(char),
    Enter,
    Backspace,
    Tab,
    Escape,
    Up,
    Down,
    Left,
    Right,
    Delete,
    Home,
    End,
    PageUp,
    PageDown,
    /// Control chord; `Ctrl('a')` encodes as `0x01`.
    Ctrl(char),
}

/// Encode a key into the bytes written to the child.
pub fn encode(key: Key) -> Vec<u8> {
    match key {
        Key::Char(ch) => {
            let mut buf = [0u8; 4];
            ch.encode_utf8(&mut buf).as_bytes().to_vec()
        }
        Key::Enter => vec![0x0D],
        Key::Backspace => vec![0x7F],
        Key::Tab => vec![0x09],
        Key::Escape => vec![0x1B],
        Key::Up => b"\x1b[A".to_vec(),
        Key::Down => b"\x1b[B".to_vec(),
        Key::Right => b"\x1b[C".to_vec(),
        Key::Left => b"\x1b[D".to_vec(),
        Key::Delete => b"\x1b[3~".to_vec(),
        Key::Home => b"\x1b[H".to_vec(),
        Key::End => b"\x1b[F".to_vec(),
        Key::PageUp => b"\x1b[5~".to_vec(),
        Key::PageDown => b"\x1b[6~".to_vec(),
        Key::Ctrl(ch) => {
            let upper = ch.to_ascii_uppercase();
            match upper {
                '@'..='_' => vec![upper as u8 - b'@'],
                _ => Vec::new(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_special_key_encodings() {
        assert_eq!(encode(Key::Backspace), vec![0x7F]);
        assert_eq!(encode(Key::Enter), b"\r");
        assert_eq!(encode(Key::Tab), b"\t");
        assert_eq!(encode(Key::Escape), vec![0x1B]);
        assert_eq!(encode(Key::Left), b"\x1b[D");
        assert_eq!(encode(Key::Right), b"\x1b[C");
        assert_eq!(encode(Key::Up), b"\x1b[A");
        assert_eq!(encode(Key::Down), b"\x1b[B");
        assert_eq!(encode(Key::Delete), b"\x1b[3~");
        assert_eq!(encode(Key::Home), b"\x1b[H");
        assert_eq!(encode(Key::End), b"\x1b[F");
        assert_eq!(encode(Key::PageUp), b"\x1b[5~");
        assert_eq!(encode(Key::PageDown), b"\x1b[6~");
    }

    #[test]
    fn test_ctrl_chords() {
        assert_eq!(encode(Key::Ctrl('a')), vec![0x01]);
        assert_eq!(encode(Key::Ctrl('A')), vec![0x01]);
        assert_eq!(encode(Key::Ctrl('z')), vec![0x1A]);
        assert_eq!(encode(Key::Ctrl('[')), vec![0x1B]);
        // Out of the control range: nothing to send.
        assert_eq!(encode(Key::Ctrl('1')), Vec::<u8>::new());
    }

    #[test]
    fn test_char_utf8() {
        assert_eq!(encode(Key::Char('x')), b"x");
        assert_eq!(encode(Key::Char('é')), "é".as_bytes());
    }
}
