//! Key encoding for terminal input
//!
//! Converts logical keys and characters from the GUI layer into the VT byte
//! sequences a terminal would produce, honoring the terminal's current
//! input modes (application cursor keys change arrow encoding).

use bitflags::bitflags;

use super::state::TerminalModes;

bitflags! {
    /// Modifier keys
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const CTRL  = 0b0010;
        const ALT   = 0b0100;
    }
}

/// Logical (non-character) keys delivered by the GUI layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Enter,
    Backspace,
    Tab,
    Escape,
    Up,
    Down,
    Right,
    Left,
    Home,
    End,
    PageUp,
    PageDown,
    Insert,
    Delete,
    F(u8),
}

/// Encode a logical key to bytes for the PTY.
pub fn encode_key(key: Key, mods: Modifiers, modes: &TerminalModes) -> Vec<u8> {
    match key {
        Key::Enter => {
            if modes.linefeed_newline {
                vec![0x0D, 0x0A]
            } else {
                vec![0x0D]
            }
        }
        Key::Backspace => {
            if mods.contains(Modifiers::ALT) {
                vec![0x1B, 0x7F]
            } else {
                vec![0x7F]
            }
        }
        Key::Tab => {
            if mods.contains(Modifiers::SHIFT) {
                b"\x1b[Z".to_vec()
            } else {
                vec![0x09]
            }
        }
        Key::Escape => vec![0x1B],

        Key::Up => arrow_key(b'A', mods, modes),
        Key::Down => arrow_key(b'B', mods, modes),
        Key::Right => arrow_key(b'C', mods, modes),
        Key::Left => arrow_key(b'D', mods, modes),

        Key::Home => special_key(b'H', mods),
        Key::End => special_key(b'F', mods),
        Key::PageUp => tilde_key(5, mods),
        Key::PageDown => tilde_key(6, mods),
        Key::Insert => tilde_key(2, mods),
        Key::Delete => tilde_key(3, mods),

        Key::F(n) => function_key(n, mods),
    }
}

/// Encode a Unicode character with modifiers.
pub fn encode_char(ch: char, mods: Modifiers) -> Vec<u8> {
    // Ctrl + letter = control character
    if mods.contains(Modifiers::CTRL) && !mods.contains(Modifiers::ALT) {
        if ch.is_ascii_lowercase() {
            return vec![(ch as u8) - b'a' + 1];
        } else if ch.is_ascii_uppercase() {
            return vec![(ch as u8) - b'A' + 1];
        } else {
            match ch {
                '@' | '`' | ' ' => return vec![0x00], // Ctrl+@ = NUL
                '[' => return vec![0x1B],             // Ctrl+[ = ESC
                '\\' => return vec![0x1C],            // Ctrl+\ = FS
                ']' => return vec![0x1D],             // Ctrl+] = GS
                '^' | '~' => return vec![0x1E],       // Ctrl+^ = RS
                '_' | '?' => return vec![0x1F],       // Ctrl+_ = US
                _ => {}
            }
        }
    }

    // Ctrl + Alt + letter
    if mods.contains(Modifiers::CTRL) && mods.contains(Modifiers::ALT) && ch.is_ascii_alphabetic()
    {
        let ctrl_code = (ch.to_ascii_lowercase() as u8) - b'a' + 1;
        return vec![0x1B, ctrl_code];
    }

    // Alt + key = ESC + key
    if mods.contains(Modifiers::ALT) && !mods.contains(Modifiers::CTRL) {
        let mut bytes = vec![0x1B];
        let mut buf = [0u8; 4];
        bytes.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
        return bytes;
    }

    // Normal character
    let mut buf = [0u8; 4];
    ch.encode_utf8(&mut buf).as_bytes().to_vec()
}

/// Wrap pasted text in bracketed-paste markers when the mode is enabled.
pub fn encode_paste(text: &str, modes: &TerminalModes) -> Vec<u8> {
    if modes.bracketed_paste {
        let mut bytes = b"\x1b[200~".to_vec();
        bytes.extend_from_slice(text.as_bytes());
        bytes.extend_from_slice(b"\x1b[201~");
        bytes
    } else {
        text.as_bytes().to_vec()
    }
}

/// Arrow key sequence
fn arrow_key(key: u8, mods: Modifiers, modes: &TerminalModes) -> Vec<u8> {
    if !mods.is_empty() {
        // With modifiers: ESC [ 1 ; <mod> <key>
        let mod_code = modifier_code(mods);
        format!("\x1b[1;{}{}", mod_code, key as char).into_bytes()
    } else if modes.application_cursor {
        // Application mode: ESC O <key>
        vec![0x1B, b'O', key]
    } else {
        // Normal mode: ESC [ <key>
        vec![0x1B, b'[', key]
    }
}

/// Special key (Home, End) sequence
fn special_key(key: u8, mods: Modifiers) -> Vec<u8> {
    if mods.is_empty() {
        vec![0x1B, b'[', key]
    } else {
        let mod_code = modifier_code(mods);
        format!("\x1b[1;{}{}", mod_code, key as char).into_bytes()
    }
}

/// Tilde key sequence (PageUp, PageDown, Insert, Delete)
fn tilde_key(code: u8, mods: Modifiers) -> Vec<u8> {
    if mods.is_empty() {
        format!("\x1b[{}~", code).into_bytes()
    } else {
        let mod_code = modifier_code(mods);
        format!("\x1b[{};{}~", code, mod_code).into_bytes()
    }
}

/// Function key sequence
fn function_key(n: u8, mods: Modifiers) -> Vec<u8> {
    let base = match n {
        1 => b"\x1bOP".to_vec(),
        2 => b"\x1bOQ".to_vec(),
        3 => b"\x1bOR".to_vec(),
        4 => b"\x1bOS".to_vec(),
        5 => b"\x1b[15~".to_vec(),
        6 => b"\x1b[17~".to_vec(),
        7 => b"\x1b[18~".to_vec(),
        8 => b"\x1b[19~".to_vec(),
        9 => b"\x1b[20~".to_vec(),
        10 => b"\x1b[21~".to_vec(),
        11 => b"\x1b[23~".to_vec(),
        12 => b"\x1b[24~".to_vec(),
        _ => return vec![],
    };

    if mods.is_empty() {
        base
    } else {
        let mod_code = modifier_code(mods);
        match n {
            1..=4 => {
                // ESC O X -> ESC [ 1 ; mod X
                let key = base[2];
                format!("\x1b[1;{}{}", mod_code, key as char).into_bytes()
            }
            _ => {
                // ESC [ n ~ -> ESC [ n ; mod ~
                let code_str = String::from_utf8_lossy(&base[2..base.len() - 1]).into_owned();
                format!("\x1b[{};{}~", code_str, mod_code).into_bytes()
            }
        }
    }
}

/// Calculate xterm modifier code
fn modifier_code(mods: Modifiers) -> u8 {
    1 + if mods.contains(Modifiers::SHIFT) { 1 } else { 0 }
        + if mods.contains(Modifiers::ALT) { 2 } else { 0 }
        + if mods.contains(Modifiers::CTRL) { 4 } else { 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_keys() {
        // Normal character
        assert_eq!(encode_char('a', Modifiers::empty()), b"a".to_vec());

        // Ctrl+C
        assert_eq!(encode_char('c', Modifiers::CTRL), vec![0x03]);

        // Alt+x
        assert_eq!(encode_char('x', Modifiers::ALT), vec![0x1B, b'x']);

        // Multi-byte char passes through as UTF-8
        assert_eq!(encode_char('é', Modifiers::empty()), "é".as_bytes().to_vec());
    }

    #[test]
    fn test_arrow_keys_respect_application_mode() {
        let mut modes = TerminalModes::default();

        assert_eq!(
            encode_key(Key::Up, Modifiers::empty(), &modes),
            b"\x1b[A".to_vec()
        );

        modes.application_cursor = true;
        assert_eq!(
            encode_key(Key::Up, Modifiers::empty(), &modes),
            b"\x1bOA".to_vec()
        );

        // Modifiers override application mode
        assert_eq!(
            encode_key(Key::Up, Modifiers::CTRL, &modes),
            b"\x1b[1;5A".to_vec()
        );
    }

    #[test]
    fn test_function_keys() {
        let modes = TerminalModes::default();
        assert_eq!(
            encode_key(Key::F(1), Modifiers::empty(), &modes),
            b"\x1bOP".to_vec()
        );
        assert_eq!(
            encode_key(Key::F(5), Modifiers::empty(), &modes),
            b"\x1b[15~".to_vec()
        );
        assert_eq!(
            encode_key(Key::F(5), Modifiers::SHIFT, &modes),
            b"\x1b[15;2~".to_vec()
        );
    }

    #[test]
    fn test_bracketed_paste() {
        let mut modes = TerminalModes::default();
        assert_eq!(encode_paste("hi", &modes), b"hi".to_vec());

        modes.bracketed_paste = true;
        assert_eq!(encode_paste("hi", &modes), b"\x1b[200~hi\x1b[201~".to_vec());
    }
}
