//! Session multiplexing
//!
//! `SessionController` owns one `ProcessRunner` per session and the shared
//! event queue. I/O threads never touch sessions or emulators: their
//! callbacks wrap bytes into `SessionEvent`s and push. The render thread
//! calls `process_events` to apply queued events to the session set, and
//! all input goes through the controller so encoded bytes reach the PTY in
//! the same step that produced them.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::core::runner::{ProcessConfig, ProcessRunner};
use crate::core::term::{Key, Modifiers};
use crate::queue::EventQueue;
use crate::session::{SessionId, SessionState, TerminalSession};

/// Events crossing from I/O threads to the render thread. Every variant
/// names the session it belongs to.
#[derive(Debug)]
pub enum SessionEvent {
    /// Raw child output bytes.
    Output(SessionId, Vec<u8>),
    /// The child exited with this code (-1 for abnormal termination).
    Exit(SessionId, i32),
    /// Bytes queued for the child's stdin from another thread.
    Input(SessionId, Vec<u8>),
    /// A session's process started.
    Started(SessionId),
    /// A session's process was asked to stop.
    Stopped(SessionId),
}

impl SessionEvent {
    pub fn session_id(&self) -> SessionId {
        match self {
            SessionEvent::Output(id, _)
            | SessionEvent::Exit(id, _)
            | SessionEvent::Input(id, _)
            | SessionEvent::Started(id)
            | SessionEvent::Stopped(id) => *id,
        }
    }
}

pub struct SessionController {
    runners: HashMap<SessionId, ProcessRunner>,
    events: Arc<EventQueue<SessionEvent>>,
}

impl Default for SessionController {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionController {
    pub fn new() -> Self {
        Self {
            runners: HashMap::new(),
            events: Arc::new(EventQueue::new()),
        }
    }

    /// The shared queue, for threads that produce events and for the
    /// render loop to park on.
    pub fn events(&self) -> Arc<EventQueue<SessionEvent>> {
        Arc::clone(&self.events)
    }

    /// Build the spawn description for a session: executable resolved from
    /// the app kind, working dir falling back to the user's home.
    pub fn build_config(session: &TerminalSession) -> ProcessConfig {
        let working_dir = if session.config.working_dir.as_os_str().is_empty() {
            std::env::var_os("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("/"))
        } else {
            session.config.working_dir.clone()
        };
        ProcessConfig {
            executable: session.config.app_kind.command(),
            args: session.config.args(),
            working_dir,
            rows: session.emulator.rows(),
            cols: session.emulator.cols(),
        }
    }

    /// Start the session's configured program. False when it is already
    /// running or the spawn failed; a failed spawn leaves the session Idle
    /// with an inline error line written straight into its terminal (the
    /// failure is synchronous, so it bypasses the queue).
    pub fn start_session(&mut self, session: &mut TerminalSession) -> bool {
        if session.is_running() {
            return false;
        }

        let id = session.id;
        let config = Self::build_config(session);
        let runner = self.runners.entry(id).or_default();

        let queue = Arc::clone(&self.events);
        let on_output = Box::new(move |bytes: &[u8]| {
            queue.push(SessionEvent::Output(id, bytes.to_vec()));
        });
        let queue = Arc::clone(&self.events);
        let on_exit = Box::new(move |code: i32| {
            queue.push(SessionEvent::Exit(id, code));
        });

        tracing::info!(
            session = id,
            command = %config.executable,
            cwd = %config.working_dir.display(),
            "starting session"
        );

        if runner.start(&config, on_output, on_exit) {
            session.state = SessionState::Running;
            session.last_exit = None;
            self.events.push(SessionEvent::Started(id));
            true
        } else {
            session.state = SessionState::Idle;
            let line = format!("failed to start {}\r\n", config.executable);
            session.emulator.write(line.as_bytes());
            false
        }
    }

    /// Ask the session's process to stop gracefully. Completion arrives as
    /// an `Exit` event.
    pub fn stop_session(&mut self, session: &mut TerminalSession) {
        if let Some(runner) = self.runners.get(&session.id) {
            if runner.is_running() {
                tracing::info!(session = session.id, "stopping session");
                runner.stop();
                session.state = SessionState::Stopping;
                self.events.push(SessionEvent::Stopped(session.id));
            }
        }
    }

    /// Force-kill the session's process.
    pub fn kill_session(&mut self, session: &mut TerminalSession) {
        if let Some(runner) = self.runners.get(&session.id) {
            runner.kill();
            session.state = SessionState::Stopping;
        }
    }

    /// Send a line of text to the child, newline appended.
    pub fn send_input(&self, session: &TerminalSession, text: &str) -> bool {
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(b'\n');
        self.write_to(session.id, &bytes)
    }

    /// Send pre-encoded bytes verbatim (control-character shortcuts).
    pub fn send_raw_key(&self, session: &TerminalSession, bytes: &[u8]) -> bool {
        self.write_to(session.id, bytes)
    }

    /// Encode a key press through the session's terminal modes and deliver
    /// it, draining the emulator's output buffer in the same step so no
    /// encoded bytes (or pending query replies) are left behind.
    pub fn send_key(&self, session: &mut TerminalSession, key: Key, mods: Modifiers) -> bool {
        session.emulator.keyboard_key(key, mods);
        self.flush_emulator_output(session)
    }

    /// Encode a typed character and deliver it.
    pub fn send_char(&self, session: &mut TerminalSession, ch: char, mods: Modifiers) -> bool {
        session.emulator.keyboard_unichar(ch, mods);
        self.flush_emulator_output(session)
    }

    /// Deliver pasted text, bracketed when the child enabled the mode.
    pub fn send_paste(&self, session: &mut TerminalSession, text: &str) -> bool {
        session.emulator.paste(text);
        self.flush_emulator_output(session)
    }

    /// Resize emulator and PTY in lockstep so the child's SIGWINCH view
    /// always matches the grid.
    pub fn resize_pty(&self, session: &mut TerminalSession, rows: u16, cols: u16) {
        session.emulator.resize(rows, cols);
        if let Some(runner) = self.runners.get(&session.id) {
            runner.resize(rows, cols);
        }
    }

    /// Drain the event queue, applying each event to its session. Returns
    /// the ids of sessions whose state or screen changed. Call from the
    /// render thread only.
    pub fn process_events(&mut self, sessions: &mut [TerminalSession]) -> Vec<SessionId> {
        let mut touched = Vec::new();
        while let Some(event) = self.events.try_pop() {
            let id = event.session_id();
            let Some(session) = sessions.iter_mut().find(|s| s.id == id) else {
                // Session closed while events were in flight
                tracing::debug!(session = id, "dropping event for unknown session");
                continue;
            };

            match event {
                SessionEvent::Output(_, bytes) => {
                    session.emulator.write(&bytes);
                    // The parser may have produced query replies
                    self.flush_emulator_output(session);
                }
                SessionEvent::Exit(_, code) => {
                    tracing::info!(session = id, code, "session exited");
                    session.state = SessionState::Idle;
                    session.last_exit = Some(code);
                }
                SessionEvent::Input(_, bytes) => {
                    self.write_to(id, &bytes);
                }
                SessionEvent::Started(_) | SessionEvent::Stopped(_) => {}
            }

            if !touched.contains(&id) {
                touched.push(id);
            }
        }
        touched
    }

    /// Drop the runner for a closed session. Any live process is killed.
    pub fn remove_session(&mut self, id: SessionId) {
        if let Some(runner) = self.runners.remove(&id) {
            if runner.is_running() {
                runner.kill();
            }
        }
    }

    fn write_to(&self, id: SessionId, bytes: &[u8]) -> bool {
        match self.runners.get(&id) {
            Some(runner) => {
                let ok = runner.write_stdin(bytes);
                if !ok {
                    tracing::debug!(session = id, "input dropped: no attached process");
                }
                ok
            }
            None => false,
        }
    }

    fn flush_emulator_output(&self, session: &mut TerminalSession) -> bool {
        let bytes = session.emulator.get_output();
        if bytes.is_empty() {
            return true;
        }
        self.write_to(session.id, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{AppKind, SessionConfig};
    use std::time::{Duration, Instant};

    fn shell_session(rows: u16, cols: u16) -> TerminalSession {
        let config = SessionConfig::new(AppKind::Shell, "/tmp");
        TerminalSession::new("test", config, rows, cols)
    }

    /// Pump events until the predicate holds or the timeout expires.
    fn pump_until(
        controller: &mut SessionController,
        sessions: &mut [TerminalSession],
        timeout: Duration,
        mut done: impl FnMut(&[TerminalSession]) -> bool,
    ) {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            controller.process_events(sessions);
            if done(sessions) {
                return;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        panic!("condition not reached before timeout");
    }

    #[test]
    fn test_echo_session_lifecycle() {
        let mut controller = SessionController::new();
        let mut sessions = vec![shell_session(24, 80)];

        assert!(controller.start_session(&mut sessions[0]));
        assert_eq!(sessions[0].state, SessionState::Running);

        assert!(controller.send_input(&sessions[0], "echo controller-ok; exit"));

        pump_until(
            &mut controller,
            &mut sessions,
            Duration::from_secs(10),
            |s| s[0].state == SessionState::Idle && s[0].last_exit.is_some(),
        );

        let screen: String = (0..24)
            .map(|r| sessions[0].emulator.row_text(r))
            .collect::<Vec<_>>()
            .join("\n");
        assert!(screen.contains("controller-ok"), "screen: {}", screen);
        assert_eq!(sessions[0].last_exit, Some(0));
    }

    #[test]
    fn test_start_is_idempotent_while_running() {
        let mut controller = SessionController::new();
        let mut sessions = vec![shell_session(24, 80)];

        assert!(controller.start_session(&mut sessions[0]));
        assert!(!controller.start_session(&mut sessions[0]));

        controller.kill_session(&mut sessions[0]);
        pump_until(
            &mut controller,
            &mut sessions,
            Duration::from_secs(10),
            |s| s[0].state == SessionState::Idle,
        );
    }

    #[test]
    fn test_events_for_closed_sessions_are_dropped() {
        let mut controller = SessionController::new();
        let queue = controller.events();
        queue.push(SessionEvent::Output(9999, b"orphan".to_vec()));

        let mut sessions = vec![shell_session(24, 80)];
        let touched = controller.process_events(&mut sessions);
        assert!(touched.is_empty());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_input_event_routes_to_runner() {
        let mut controller = SessionController::new();
        let mut sessions = vec![shell_session(24, 80)];
        assert!(controller.start_session(&mut sessions[0]));

        controller
            .events()
            .push(SessionEvent::Input(sessions[0].id, b"echo queued; exit\n".to_vec()));

        pump_until(
            &mut controller,
            &mut sessions,
            Duration::from_secs(10),
            |s| s[0].state == SessionState::Idle,
        );
        let screen: String = (0..24)
            .map(|r| sessions[0].emulator.row_text(r))
            .collect::<Vec<_>>()
            .join("\n");
        assert!(screen.contains("queued"), "screen: {}", screen);
    }

    #[test]
    fn test_send_key_reaches_child() {
        let mut controller = SessionController::new();
        let mut sessions = vec![shell_session(24, 80)];
        assert!(controller.start_session(&mut sessions[0]));

        for ch in "exit".chars() {
            assert!(controller.send_char(&mut sessions[0], ch, Modifiers::empty()));
        }
        assert!(controller.send_key(&mut sessions[0], Key::Enter, Modifiers::empty()));

        pump_until(
            &mut controller,
            &mut sessions,
            Duration::from_secs(10),
            |s| s[0].state == SessionState::Idle,
        );
    }

    #[test]
    fn test_resize_without_process_is_safe() {
        let controller = SessionController::new();
        let mut session = shell_session(24, 80);
        controller.resize_pty(&mut session, 40, 120);
        assert_eq!(session.emulator.rows(), 40);
        assert_eq!(session.emulator.cols(), 120);
    }

    #[test]
    fn test_start_failure_writes_inline_error() {
        let mut controller = SessionController::new();
        let mut session = shell_session(24, 80);
        session.config.working_dir = "/definitely/not/a/dir".into();

        assert!(!controller.start_session(&mut session));
        assert_eq!(session.state, SessionState::Idle);
        let line = session.emulator.row_text(0);
        assert!(line.contains("failed to start"), "line: {}", line);
    }

    #[test]
    fn test_build_config_falls_back_to_home() {
        let mut session = shell_session(24, 80);
        session.config.working_dir = PathBuf::new();
        let config = SessionController::build_config(&session);
        assert!(!config.working_dir.as_os_str().is_empty());
        assert_eq!(config.rows, 24);
        assert_eq!(config.cols, 80);
    }
}
