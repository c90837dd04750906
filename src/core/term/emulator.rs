//! Terminal emulator facade
//!
//! Wraps the VT parser and screen state behind the interface the session
//! layer consumes: feed child output bytes in, read resolved cells out, and
//! encode keyboard input according to the terminal's current modes.
//!
//! The input byte stream may be split anywhere - mid escape sequence or mid
//! UTF-8 character - across `write` calls; partial sequences are buffered so
//! chunking never changes the resulting grid.

use std::collections::VecDeque;

use super::color::{Color, Rgb};
use super::input::{self, Key, Modifiers};
use super::parser::VtParser;
use super::state::{AttrFlags, Cell, CursorShape, Row, TerminalState};

/// Default foreground when the host has not configured one.
const DEFAULT_FG: Rgb = Rgb::new(229, 229, 229);
/// Default background when the host has not configured one.
const DEFAULT_BG: Rgb = Rgb::new(0, 0, 0);

/// A fully resolved cell, ready to draw. Colors are concrete RGB; `width`
/// 0 marks the continuation half of a wide character and is never drawn
/// standalone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TerminalCell {
    pub text: String,
    pub width: u8,
    pub fg: Rgb,
    pub bg: Rgb,
    pub flags: AttrFlags,
}

/// Cursor snapshot for the renderer. Read-only to consumers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CursorInfo {
    pub row: u16,
    pub col: u16,
    pub visible: bool,
    pub shape: CursorShape,
}

/// VT100/ECMA-48 terminal emulator.
pub struct TerminalEmulator {
    state: TerminalState,
    parser: VtParser,
    /// Trailing bytes of an incomplete UTF-8 sequence from the last write
    pending: Vec<u8>,
    /// Encoded keyboard input and parser query responses, drained by
    /// `get_output`
    output: Vec<u8>,
    default_fg: Rgb,
    default_bg: Rgb,
}

impl TerminalEmulator {
    pub fn new(rows: u16, cols: u16) -> Self {
        Self {
            state: TerminalState::new(cols, rows),
            parser: VtParser::new(),
            pending: Vec::new(),
            output: Vec::new(),
            default_fg: DEFAULT_FG,
            default_bg: DEFAULT_BG,
        }
    }

    pub fn rows(&self) -> u16 {
        self.state.rows
    }

    pub fn cols(&self) -> u16 {
        self.state.cols
    }

    pub fn title(&self) -> &str {
        &self.state.title
    }

    /// Feed raw output bytes from the child process. Grid, cursor, and
    /// scrollback are updated synchronously before return.
    pub fn write(&mut self, bytes: &[u8]) {
        let buffer;
        let bytes = if self.pending.is_empty() {
            bytes
        } else {
            let mut joined = std::mem::take(&mut self.pending);
            joined.extend_from_slice(bytes);
            buffer = joined;
            &buffer
        };

        let mut i = 0;
        while i < bytes.len() {
            let b = bytes[i];

            // Control characters, escape sequences, and plain ASCII go
            // through the parser byte by byte. While a sequence is in
            // flight every byte belongs to it (OSC payloads may contain
            // non-ASCII), so the parser gets those too.
            if b < 0x80 || self.parser.in_sequence() {
                if let Some(response) = self.parser.feed(b, &mut self.state) {
                    self.output.extend_from_slice(&response.to_bytes());
                }
                i += 1;
                continue;
            }

            // UTF-8 multi-byte sequence
            let seq_len = if b & 0xE0 == 0xC0 {
                2
            } else if b & 0xF0 == 0xE0 {
                3
            } else if b & 0xF8 == 0xF0 {
                4
            } else {
                1 // Invalid lead byte, skip
            };

            if i + seq_len > bytes.len() {
                // Incomplete sequence at the end of the chunk - keep it for
                // the next write
                self.pending.extend_from_slice(&bytes[i..]);
                break;
            }

            if let Ok(s) = std::str::from_utf8(&bytes[i..i + seq_len]) {
                for ch in s.chars() {
                    self.state.put_char(ch);
                }
                i += seq_len;
            } else {
                // Invalid sequence, drop one byte
                i += 1;
            }
        }
    }

    /// Resize the grid. No-op when dimensions are unchanged; otherwise the
    /// cursor is clamped into bounds and scrollback is preserved.
    pub fn resize(&mut self, rows: u16, cols: u16) {
        if rows == self.state.rows && cols == self.state.cols {
            return;
        }
        self.state.resize(cols, rows);
    }

    /// Resolved cell at (row, col). Out-of-range or uninitialized positions
    /// resolve to a blank cell with default colors.
    pub fn get_cell(&self, row: u16, col: u16) -> TerminalCell {
        let screen = self.state.active_screen();
        screen
            .get_row_at(row as usize)
            .and_then(|r| r.cells.get(col as usize))
            .map(|cell| self.resolve(cell))
            .unwrap_or_else(|| self.blank_cell())
    }

    pub fn get_cursor(&self) -> CursorInfo {
        let cursor = self.state.active_cursor();
        CursorInfo {
            row: cursor.row.min(self.state.rows.saturating_sub(1)),
            col: cursor.col.min(self.state.cols.saturating_sub(1)),
            visible: cursor.visible,
            shape: cursor.shape,
        }
    }

    /// Encode a logical key per the current input modes and buffer the
    /// bytes for `get_output`.
    pub fn keyboard_key(&mut self, key: Key, mods: Modifiers) {
        let bytes = input::encode_key(key, mods, &self.state.modes);
        self.output.extend_from_slice(&bytes);
    }

    /// Encode a Unicode character and buffer the bytes for `get_output`.
    pub fn keyboard_unichar(&mut self, ch: char, mods: Modifiers) {
        let bytes = input::encode_char(ch, mods);
        self.output.extend_from_slice(&bytes);
    }

    /// Encode pasted text (bracketed when the child enabled the mode).
    pub fn paste(&mut self, text: &str) {
        let bytes = input::encode_paste(text, &self.state.modes);
        self.output.extend_from_slice(&bytes);
    }

    /// Drain the buffered encoded input bytes for writing to the PTY. Must
    /// be called after each keyboard event or the encoded bytes are lost.
    pub fn get_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }

    /// Re-color the default sentinel. Cells written with explicit colors
    /// are untouched; cells using the default resolve against these values
    /// from now on.
    pub fn set_default_colors(&mut self, fg: Rgb, bg: Rgb) {
        self.default_fg = fg;
        self.default_bg = bg;
    }

    /// Primary-screen scrollback, oldest line first. The alternate screen
    /// never contributes here.
    pub fn scrollback(&self) -> &VecDeque<Row> {
        &self.state.primary_screen.scrollback
    }

    /// Resolve an internal cell (grid or scrollback) to a drawable cell.
    pub fn resolve(&self, cell: &Cell) -> TerminalCell {
        TerminalCell {
            text: cell.display_str().to_string(),
            width: cell.width,
            fg: cell.attrs.fg.resolve(self.default_fg),
            bg: cell.attrs.bg.resolve(self.default_bg),
            flags: cell.attrs.flags,
        }
    }

    /// Scroll the view up into scrollback by n lines.
    pub fn scroll_view_up(&mut self, n: usize) {
        self.state.active_screen_mut().scroll_view_up(n);
    }

    /// Scroll the view back down by n lines.
    pub fn scroll_view_down(&mut self, n: usize) {
        self.state.active_screen_mut().scroll_view_down(n);
    }

    /// Jump back to the live view.
    pub fn scroll_to_bottom(&mut self) {
        self.state.active_screen_mut().scroll_to_bottom();
    }

    pub fn is_scrolled(&self) -> bool {
        self.state.active_screen().is_scrolled()
    }

    /// True when the whole grid should be repainted (resize, screen
    /// switch, view scroll).
    pub fn needs_full_redraw(&self) -> bool {
        self.state.active_screen().full_redraw
    }

    /// Rows touched since the last `clear_damage`, ascending. Meaningless
    /// while `needs_full_redraw` is set.
    pub fn dirty_lines(&self) -> Vec<usize> {
        let mut lines: Vec<usize> = self
            .state
            .active_screen()
            .dirty_lines
            .iter()
            .copied()
            .collect();
        lines.sort_unstable();
        lines
    }

    /// Mark the current grid as painted.
    pub fn clear_damage(&mut self) {
        self.state.active_screen_mut().clear_dirty();
    }

    /// Plain-text view of a visible row (for tests and copy).
    pub fn row_text(&self, row: u16) -> String {
        self.state
            .active_screen()
            .get_row_at(row as usize)
            .map(|r| r.text())
            .unwrap_or_default()
    }

    fn blank_cell(&self) -> TerminalCell {
        TerminalCell {
            text: " ".to_string(),
            width: 1,
            fg: Color::Default.resolve(self.default_fg),
            bg: Color::Default.resolve(self.default_bg),
            flags: AttrFlags::empty(),
        }
    }
}
