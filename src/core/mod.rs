//! Process and terminal core: PTY plumbing, the process runner, toolchain
//! discovery, and the terminal emulator.

pub mod pty;
pub mod runner;
pub mod term;
pub mod toolchain;

pub use pty::{PtyError, PtyProcess};
pub use runner::{ExitCallback, OutputCallback, ProcessConfig, ProcessRunner, RunnerState};
