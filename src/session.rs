//! Session model
//!
//! A session pairs one terminal emulator with the configuration of the
//! program it hosts: a coding-agent CLI or a plain shell. Process state
//! lives in the controller; the session owns the emulator and the
//! user-facing identity (id, name).

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::core::term::TerminalEmulator;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Stable, process-unique session identifier.
pub type SessionId = u64;

/// The program a session hosts. Closed set: the dashboard only knows how
/// to drive these.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppKind {
    Claude,
    Codex,
    Gemini,
    Shell,
}

impl AppKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            AppKind::Claude => "Claude Code",
            AppKind::Codex => "Codex",
            AppKind::Gemini => "Gemini",
            AppKind::Shell => "Shell",
        }
    }

    /// The executable to spawn. The shell honors `$SHELL`.
    pub fn command(&self) -> String {
        match self {
            AppKind::Claude => "claude".to_string(),
            AppKind::Codex => "codex".to_string(),
            AppKind::Gemini => "gemini".to_string(),
            AppKind::Shell => {
                std::env::var("SHELL").unwrap_or_else(|_| "/bin/bash".to_string())
            }
        }
    }
}

/// How to launch a session's program.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    pub app_kind: AppKind,
    /// Model provider override, where the CLI supports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Model override passed to the CLI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub working_dir: PathBuf,
}

impl SessionConfig {
    pub fn new(app_kind: AppKind, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            app_kind,
            provider: None,
            model: None,
            working_dir: working_dir.into(),
        }
    }

    /// Command-line arguments for the configured program.
    pub fn args(&self) -> Vec<String> {
        let mut args = Vec::new();
        match self.app_kind {
            AppKind::Claude | AppKind::Codex | AppKind::Gemini => {
                if let Some(model) = &self.model {
                    args.push("--model".to_string());
                    args.push(model.clone());
                }
                if self.app_kind == AppKind::Codex {
                    if let Some(provider) = &self.provider {
                        args.push("-c".to_string());
                        args.push(format!("model_provider={}", provider));
                    }
                }
            }
            AppKind::Shell => {}
        }
        args
    }
}

/// Session lifecycle as the UI sees it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Idle,
    Running,
    Stopping,
}

/// One terminal session: emulator plus identity and launch config.
pub struct TerminalSession {
    pub id: SessionId,
    pub name: String,
    pub config: SessionConfig,
    pub state: SessionState,
    pub emulator: TerminalEmulator,
    /// Exit code of the last run, once it has finished.
    pub last_exit: Option<i32>,
    /// In-progress rename text, `Some` while the tab title is being edited.
    pub pending_rename: Option<String>,
}

impl TerminalSession {
    pub fn new(name: impl Into<String>, config: SessionConfig, rows: u16, cols: u16) -> Self {
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            config,
            state: SessionState::Idle,
            emulator: TerminalEmulator::new(rows, cols),
            last_exit: None,
            pending_rename: None,
        }
    }

    /// Begin editing the display name, seeded with the current one.
    pub fn begin_rename(&mut self) {
        self.pending_rename = Some(self.name.clone());
    }

    /// Commit the pending rename, if any.
    pub fn commit_rename(&mut self) {
        if let Some(name) = self.pending_rename.take() {
            if !name.trim().is_empty() {
                self.name = name;
            }
        }
    }

    pub fn cancel_rename(&mut self) {
        self.pending_rename = None;
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, SessionState::Running | SessionState::Stopping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_ids_are_unique_and_increasing() {
        let config = SessionConfig::new(AppKind::Shell, "/tmp");
        let a = TerminalSession::new("a", config.clone(), 24, 80);
        let b = TerminalSession::new("b", config, 24, 80);
        assert!(b.id > a.id);
    }

    #[test]
    fn test_model_args() {
        let mut config = SessionConfig::new(AppKind::Claude, "/tmp");
        assert!(config.args().is_empty());

        config.model = Some("opus".to_string());
        assert_eq!(config.args(), vec!["--model", "opus"]);
    }

    #[test]
    fn test_codex_provider_arg() {
        let mut config = SessionConfig::new(AppKind::Codex, "/tmp");
        config.provider = Some("openai".to_string());
        assert_eq!(config.args(), vec!["-c", "model_provider=openai"]);
    }

    #[test]
    fn test_shell_command_falls_back() {
        // SHELL is set in practice; the fallback only matters when unset
        let cmd = AppKind::Shell.command();
        assert!(!cmd.is_empty());
    }

    #[test]
    fn test_rename_commit_and_cancel() {
        let config = SessionConfig::new(AppKind::Shell, "/tmp");
        let mut session = TerminalSession::new("old", config, 24, 80);

        session.begin_rename();
        session.pending_rename = Some("new".to_string());
        session.commit_rename();
        assert_eq!(session.name, "new");
        assert!(session.pending_rename.is_none());

        session.begin_rename();
        session.cancel_rename();
        assert_eq!(session.name, "new");

        // Blank edits are discarded
        session.pending_rename = Some("   ".to_string());
        session.commit_rename();
        assert_eq!(session.name, "new");
    }

    #[test]
    fn test_config_round_trips_through_serde() {
        let mut config = SessionConfig::new(AppKind::Gemini, "/work");
        config.model = Some("gemini-pro".to_string());
        let json = serde_json::to_string(&config).unwrap();
        let back: SessionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.app_kind, AppKind::Gemini);
        assert_eq!(back.model.as_deref(), Some("gemini-pro"));
    }
}
