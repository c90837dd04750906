//! agentdeck terminal core
//!
//! The process and terminal layer behind a desktop dashboard for coding
//! agents: each session runs an agent CLI (or a shell) on its own PTY,
//! feeds the output through an embedded VT100 emulator, and surfaces a
//! cell grid the GUI paints.
//!
//! Threading model: one I/O thread per running process, one render thread.
//! The only object shared between them is the [`queue::EventQueue`];
//! everything else is single-writer. I/O callbacks wrap bytes into
//! [`controller::SessionEvent`]s and push; the render thread drains the
//! queue via [`controller::SessionController::process_events`].

pub mod ansi;
pub mod controller;
pub mod core;
pub mod logging;
pub mod queue;
pub mod session;

pub use crate::controller::{SessionController, SessionEvent};
pub use crate::core::runner::{ProcessRunner, RunnerState};
pub use crate::core::term::{
    CursorInfo, Key, Modifiers, Rgb, TerminalCell, TerminalEmulator,
};
pub use crate::queue::EventQueue;
pub use crate::session::{AppKind, SessionConfig, SessionId, SessionState, TerminalSession};
