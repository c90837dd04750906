//! Terminal emulation
//!
//! A VT100/ECMA-48 terminal emulator: byte-level parser, screen state with
//! bounded scrollback, key encoding, and the `TerminalEmulator` facade tying
//! them together.

pub mod color;
pub mod emulator;
pub mod input;
pub mod parser;
pub mod state;

pub use color::{palette_rgb, Color, Rgb};
pub use emulator::{CursorInfo, TerminalCell, TerminalEmulator};
pub use input::{Key, Modifiers};
pub use state::{AttrFlags, CursorShape, Row, SCROLLBACK_LIMIT};
