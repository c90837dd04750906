//! PTY allocation and child process plumbing
//!
//! Wraps `portable-pty` to spawn a command on a pseudo-terminal with the
//! environment a terminal application expects. Reading is left to the
//! caller (the process runner owns the reader thread); this module owns
//! spawning, writing, resizing, and signalling.

use std::collections::HashSet;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use thiserror::Error;

use super::toolchain;

#[derive(Debug, Error)]
pub enum PtyError {
    #[error("working directory does not exist: {0}")]
    WorkingDir(PathBuf),
    #[error("failed to open PTY: {0}")]
    Open(String),
    #[error("failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("PTY I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A spawned child process attached to a PTY.
///
/// The child runs in its own session with the PTY slave as controlling
/// terminal, so signalling the process group reaches the whole job.
pub struct PtyProcess {
    master: Box<dyn MasterPty + Send>,
    writer: Box<dyn Write + Send>,
    child: Box<dyn Child + Send + Sync>,
    /// Reader for the master side, taken once by the I/O thread.
    reader: Option<Box<dyn Read + Send>>,
}

impl PtyProcess {
    /// Spawn `command` with `args` on a fresh PTY of the given size.
    ///
    /// The child environment inherits the parent's, with `PATH` augmented
    /// by the toolchain discovery dirs and `TERM`/`COLORTERM`/`LANG` pinned
    /// to values full-screen CLI tools expect.
    pub fn spawn(
        command: &str,
        args: &[String],
        cwd: &Path,
        rows: u16,
        cols: u16,
    ) -> Result<Self, PtyError> {
        if !cwd.is_dir() {
            return Err(PtyError::WorkingDir(cwd.to_path_buf()));
        }

        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| PtyError::Open(e.to_string()))?;

        let mut builder = CommandBuilder::new(command);
        builder.args(args);
        builder.cwd(cwd);

        // CommandBuilder starts from an empty environment; copy the
        // parent's so the child sees the user's full setup
        for (key, value) in std::env::vars() {
            builder.env(key, value);
        }
        builder.env("PATH", toolchain::augmented_path());
        builder.env("TERM", "xterm-256color");
        builder.env("COLORTERM", "truecolor");
        builder.env("LANG", "en_US.UTF-8");

        let child = pair.slave.spawn_command(builder).map_err(|e| PtyError::Spawn {
            command: command.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
        })?;

        tracing::debug!(command, pid = ?child.process_id(), "spawned PTY child");

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| PtyError::Open(e.to_string()))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| PtyError::Open(e.to_string()))?;

        Ok(Self {
            master: pair.master,
            writer,
            child,
            reader: Some(reader),
        })
    }

    /// Take the output reader. Returns `None` after the first call.
    pub fn take_reader(&mut self) -> Option<Box<dyn Read + Send>> {
        self.reader.take()
    }

    /// Write bytes to the child's stdin. Short writes are an error: the
    /// caller treats any failure as "input not delivered".
    pub fn write(&mut self, data: &[u8]) -> Result<(), PtyError> {
        self.writer.write_all(data)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Resize the PTY. The kernel delivers SIGWINCH to the child.
    pub fn resize(&self, rows: u16, cols: u16) -> Result<(), PtyError> {
        self.master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| PtyError::Open(e.to_string()))
    }

    pub fn process_id(&self) -> Option<u32> {
        self.child.process_id()
    }

    /// Non-blocking exit check. `Some(code)` once the child has exited;
    /// abnormal termination (signal, wait error) reports as -1.
    pub fn try_wait(&mut self) -> Option<i32> {
        match self.child.try_wait() {
            Ok(Some(status)) => {
                if status.success() {
                    Some(0)
                } else {
                    // portable-pty folds signal deaths into a nonzero code;
                    // a code that fits u8 is a real exit status
                    let code = status.exit_code();
                    if code <= u8::MAX as u32 {
                        Some(code as i32)
                    } else {
                        Some(-1)
                    }
                }
            }
            Ok(None) => None,
            Err(_) => Some(-1),
        }
    }

    /// Ask the child's process group to terminate (SIGTERM). The child is
    /// its session leader, so the group id equals its pid.
    pub fn terminate(&self) {
        #[cfg(unix)]
        if let Some(pid) = self.child.process_id() {
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;
            let _ = killpg(Pid::from_raw(pid as i32), Signal::SIGTERM);
            return;
        }
        // No pid (already reaped) - nothing to signal
    }

    /// Force-kill the child's process group (SIGKILL).
    pub fn kill(&mut self) {
        #[cfg(unix)]
        if let Some(pid) = self.child.process_id() {
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;
            let _ = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL);
        }
        let _ = self.child.kill();
    }
}

/// Deduplicating PATH join, preserving first occurrence order.
pub(crate) fn join_path_dedup(dirs: impl IntoIterator<Item = PathBuf>) -> String {
    let mut seen = HashSet::new();
    let mut parts = Vec::new();
    for dir in dirs {
        let s = dir.to_string_lossy().into_owned();
        if !s.is_empty() && seen.insert(s.clone()) {
            parts.push(s);
        }
    }
    parts.join(":")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_spawn_echo_and_exit() {
        let mut pty = PtyProcess::spawn(
            "/bin/echo",
            &["hello".to_string()],
            Path::new("/tmp"),
            24,
            80,
        )
        .expect("spawn echo");

        let mut reader = pty.take_reader().expect("reader");
        let mut output = Vec::new();
        let mut buf = [0u8; 4096];
        // Read until EOF (child exit closes the slave side)
        loop {
            match reader.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => output.extend_from_slice(&buf[..n]),
            }
        }
        let text = String::from_utf8_lossy(&output);
        assert!(text.contains("hello"), "missing echo output: {:?}", text);

        // Exit code arrives after output
        let mut code = None;
        for _ in 0..50 {
            if let Some(c) = pty.try_wait() {
                code = Some(c);
                break;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        assert_eq!(code, Some(0));
    }

    #[test]
    fn test_spawn_rejects_missing_cwd() {
        let result = PtyProcess::spawn(
            "/bin/echo",
            &[],
            Path::new("/nonexistent/definitely/missing"),
            24,
            80,
        );
        assert!(matches!(result, Err(PtyError::WorkingDir(_))));
    }

    #[test]
    fn test_take_reader_is_single_use() {
        let mut pty =
            PtyProcess::spawn("/bin/true", &[], Path::new("/tmp"), 24, 80).expect("spawn");
        assert!(pty.take_reader().is_some());
        assert!(pty.take_reader().is_none());
    }

    #[test]
    fn test_join_path_dedup() {
        let joined = join_path_dedup(vec![
            PathBuf::from("/usr/bin"),
            PathBuf::from("/usr/local/bin"),
            PathBuf::from("/usr/bin"),
        ]);
        assert_eq!(joined, "/usr/bin:/usr/local/bin");
    }
}
