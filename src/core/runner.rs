//! Process lifecycle driver
//!
//! `ProcessRunner` owns one PTY child and its I/O thread. The thread reads
//! child output and hands it to the output callback; when the stream ends
//! the exit callback fires exactly once, always after the final output.
//! Callbacks run on the I/O thread and must only hand data off (push an
//! event), never touch shared state directly.

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use super::pty::PtyProcess;

/// How long SIGTERM gets before escalating to SIGKILL. Short: a stopping
/// session should not linger on a child that ignores the signal.
const STOP_GRACE: Duration = Duration::from_millis(500);

/// How long to wait for the exit status after output EOF.
const REAP_TIMEOUT: Duration = Duration::from_secs(5);

pub type OutputCallback = Box<dyn FnMut(&[u8]) + Send>;
pub type ExitCallback = Box<dyn FnMut(i32) + Send>;

/// What to run and where. Immutable once handed to `start`.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ProcessConfig {
    pub executable: String,
    pub args: Vec<String>,
    pub working_dir: std::path::PathBuf,
    pub rows: u16,
    pub cols: u16,
}

/// Runner lifecycle. Transitions only move forward around the cycle:
/// Idle -> Starting -> Running -> Stopping -> Idle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunnerState {
    Idle,
    Starting,
    Running,
    Stopping,
}

pub struct ProcessRunner {
    state: Arc<Mutex<RunnerState>>,
    pty: Arc<Mutex<Option<PtyProcess>>>,
    exited: Arc<AtomicBool>,
    io_thread: Option<JoinHandle<()>>,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(RunnerState::Idle)),
            pty: Arc::new(Mutex::new(None)),
            exited: Arc::new(AtomicBool::new(false)),
            io_thread: None,
        }
    }

    pub fn state(&self) -> RunnerState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state(), RunnerState::Starting | RunnerState::Running)
    }

    /// Spawn the configured command and begin pumping its output. Returns
    /// false with no side effect when a process is already attached or the
    /// spawn failed - no thread is launched and no callback fires.
    pub fn start(
        &mut self,
        config: &ProcessConfig,
        mut on_output: OutputCallback,
        mut on_exit: ExitCallback,
    ) -> bool {
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if *state != RunnerState::Idle {
                tracing::warn!(command = %config.executable, "start refused: runner not idle");
                return false;
            }
            *state = RunnerState::Starting;
        }
        // A previous run's thread is finished once state is Idle again;
        // reclaim it before attaching a new child
        if let Some(handle) = self.io_thread.take() {
            let _ = handle.join();
        }
        self.exited.store(false, Ordering::SeqCst);

        let mut pty = match PtyProcess::spawn(
            &config.executable,
            &config.args,
            &config.working_dir,
            config.rows,
            config.cols,
        ) {
            Ok(pty) => pty,
            Err(err) => {
                tracing::error!(command = %config.executable, %err, "spawn failed");
                *self.state.lock().unwrap_or_else(|e| e.into_inner()) = RunnerState::Idle;
                return false;
            }
        };

        let reader = pty.take_reader();
        *self.pty.lock().unwrap_or_else(|e| e.into_inner()) = Some(pty);
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = RunnerState::Running;

        let state = Arc::clone(&self.state);
        let pty_slot = Arc::clone(&self.pty);
        let exited = Arc::clone(&self.exited);

        self.io_thread = Some(std::thread::spawn(move || {
            let mut buf = [0u8; 4096];
            if let Some(mut reader) = reader {
                loop {
                    match reader.read(&mut buf) {
                        // EOF or EIO: the child closed its side
                        Ok(0) | Err(_) => break,
                        Ok(n) => on_output(&buf[..n]),
                    }
                }
            }

            // All output is delivered; now collect the exit status
            let code = reap(&pty_slot);
            exited.store(true, Ordering::SeqCst);
            *pty_slot.lock().unwrap_or_else(|e| e.into_inner()) = None;
            *state.lock().unwrap_or_else(|e| e.into_inner()) = RunnerState::Idle;
            on_exit(code);
        }));

        true
    }

    /// Write bytes to the child's stdin. False when no child is attached
    /// or the write did not fully succeed.
    pub fn write_stdin(&self, data: &[u8]) -> bool {
        let mut pty = self.pty.lock().unwrap_or_else(|e| e.into_inner());
        match pty.as_mut() {
            Some(pty) => pty.write(data).is_ok(),
            None => false,
        }
    }

    /// Resize the PTY. Silently ignored when no child is attached.
    pub fn resize(&self, rows: u16, cols: u16) {
        let pty = self.pty.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(pty) = pty.as_ref() {
            if let Err(err) = pty.resize(rows, cols) {
                tracing::warn!(%err, "PTY resize failed");
            }
        }
    }

    /// Request graceful termination: SIGTERM to the process group, then
    /// SIGKILL if the child is still alive after the grace period.
    /// Fire-and-forget; completion is observed via the exit callback.
    pub fn stop(&self) {
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            match *state {
                RunnerState::Starting | RunnerState::Running => *state = RunnerState::Stopping,
                _ => return,
            }
        }

        let pid = {
            let pty = self.pty.lock().unwrap_or_else(|e| e.into_inner());
            match pty.as_ref() {
                Some(pty) => {
                    pty.terminate();
                    pty.process_id()
                }
                None => return,
            }
        };
        // No pid means the child is already gone; nothing to escalate on
        let Some(pid) = pid else { return };

        let pty_slot = Arc::clone(&self.pty);
        let exited = Arc::clone(&self.exited);
        std::thread::spawn(move || {
            let deadline = Instant::now() + STOP_GRACE;
            while Instant::now() < deadline {
                if exited.load(Ordering::SeqCst) {
                    return;
                }
                std::thread::sleep(Duration::from_millis(20));
            }
            let mut pty = pty_slot.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(pty) = pty.as_mut() {
                // The slot may hold a different child by now: the one this
                // watchdog was armed for can exit and be replaced by a
                // restart during the grace window
                if pty.process_id() == Some(pid) {
                    tracing::warn!(pid, "grace period expired, killing process group");
                    pty.kill();
                }
            }
        });
    }

    /// Immediate SIGKILL to the process group. Fire-and-forget.
    pub fn kill(&self) {
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            match *state {
                RunnerState::Starting | RunnerState::Running | RunnerState::Stopping => {
                    *state = RunnerState::Stopping
                }
                RunnerState::Idle => return,
            }
        }
        let mut pty = self.pty.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(pty) = pty.as_mut() {
            pty.kill();
        }
    }
}

impl Drop for ProcessRunner {
    fn drop(&mut self) {
        self.kill();
        if let Some(handle) = self.io_thread.take() {
            let _ = handle.join();
        }
    }
}

/// Wait for the exit status after EOF. -1 when the status never arrives
/// or the child died abnormally.
fn reap(pty_slot: &Arc<Mutex<Option<PtyProcess>>>) -> i32 {
    let deadline = Instant::now() + REAP_TIMEOUT;
    loop {
        {
            let mut pty = pty_slot.lock().unwrap_or_else(|e| e.into_inner());
            match pty.as_mut() {
                Some(pty) => {
                    if let Some(code) = pty.try_wait() {
                        return code;
                    }
                }
                None => return -1,
            }
        }
        if Instant::now() >= deadline {
            return -1;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    enum Event {
        Output(Vec<u8>),
        Exit(i32),
    }

    fn config(executable: &str, args: &[&str]) -> ProcessConfig {
        ProcessConfig {
            executable: executable.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            working_dir: "/tmp".into(),
            rows: 24,
            cols: 80,
        }
    }

    fn callbacks(tx: mpsc::Sender<Event>) -> (OutputCallback, ExitCallback) {
        let out_tx = tx.clone();
        (
            Box::new(move |bytes: &[u8]| {
                let _ = out_tx.send(Event::Output(bytes.to_vec()));
            }),
            Box::new(move |code: i32| {
                let _ = tx.send(Event::Exit(code));
            }),
        )
    }

    fn collect_until_exit(rx: &mpsc::Receiver<Event>) -> (Vec<u8>, i32) {
        let mut output = Vec::new();
        loop {
            match rx.recv_timeout(Duration::from_secs(10)).expect("event") {
                Event::Output(bytes) => output.extend_from_slice(&bytes),
                Event::Exit(code) => return (output, code),
            }
        }
    }

    #[test]
    fn test_echo_output_then_exit() {
        let (tx, rx) = mpsc::channel();
        let (on_output, on_exit) = callbacks(tx);

        let mut runner = ProcessRunner::new();
        assert!(runner.start(&config("/bin/echo", &["hello"]), on_output, on_exit));

        let (output, code) = collect_until_exit(&rx);
        assert!(String::from_utf8_lossy(&output).contains("hello"));
        assert_eq!(code, 0);

        // Exit is observed after every output chunk by construction; the
        // runner is reusable once idle
        for _ in 0..100 {
            if runner.state() == RunnerState::Idle {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(runner.state(), RunnerState::Idle);
    }

    #[test]
    fn test_start_refused_while_running() {
        let (tx, rx) = mpsc::channel();
        let (on_output, on_exit) = callbacks(tx);

        let mut runner = ProcessRunner::new();
        assert!(runner.start(&config("/bin/sleep", &["5"]), on_output, on_exit));
        assert!(runner.is_running());

        let (tx2, _rx2) = mpsc::channel();
        let (on_output2, on_exit2) = callbacks(tx2);
        assert!(!runner.start(&config("/bin/echo", &[]), on_output2, on_exit2));

        runner.kill();
        let (_, code) = collect_until_exit(&rx);
        assert_ne!(code, 0); // Killed, not a clean exit
    }

    #[test]
    fn test_spawn_failure_has_no_side_effect() {
        let (tx, rx) = mpsc::channel();
        let (on_output, on_exit) = callbacks(tx);

        let mut runner = ProcessRunner::new();
        let mut bad = config("/bin/echo", &[]);
        bad.working_dir = "/definitely/not/a/dir".into();
        assert!(!runner.start(&bad, on_output, on_exit));

        // No thread, no callbacks, state back to Idle
        assert_eq!(runner.state(), RunnerState::Idle);
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn test_stop_watchdog_spares_restarted_child() {
        let (tx, rx) = mpsc::channel();
        let (on_output, on_exit) = callbacks(tx);

        let mut runner = ProcessRunner::new();
        // A child that ignores SIGTERM keeps the escalation watchdog armed
        assert!(runner.start(
            &config("/bin/sh", &["-c", "trap '' TERM; sleep 30"]),
            on_output,
            on_exit,
        ));
        std::thread::sleep(Duration::from_millis(100));
        runner.stop();
        // Put the first child down while the watchdog is still pending
        runner.kill();
        let _ = collect_until_exit(&rx);

        // Restart inside the grace window
        let (tx2, rx2) = mpsc::channel();
        let (on_output2, on_exit2) = callbacks(tx2);
        assert!(runner.start(&config("/bin/sleep", &["30"]), on_output2, on_exit2));

        // The expired watchdog must not touch the new child
        std::thread::sleep(STOP_GRACE + Duration::from_millis(200));
        assert!(runner.is_running());
        assert!(rx2.try_recv().is_err());

        runner.kill();
        let (_, code) = collect_until_exit(&rx2);
        assert_ne!(code, 0);
    }

    #[test]
    fn test_nonzero_exit_code() {
        let (tx, rx) = mpsc::channel();
        let (on_output, on_exit) = callbacks(tx);

        let mut runner = ProcessRunner::new();
        assert!(runner.start(&config("/bin/sh", &["-c", "exit 3"]), on_output, on_exit));
        let (_, code) = collect_until_exit(&rx);
        assert_eq!(code, 3);
    }

    #[test]
    fn test_write_stdin_requires_child() {
        let runner = ProcessRunner::new();
        assert!(!runner.write_stdin(b"ignored"));
        // Resize with no child is a silent no-op
        runner.resize(50, 120);
    }
}
