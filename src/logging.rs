//! File-backed logging setup
//!
//! The terminal core renders into a GUI, so logs go to a file rather than
//! stderr. Level defaults to INFO and can be overridden with the standard
//! `RUST_LOG` syntax.

use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

/// `~/.agentdeck/agentdeck.log`, falling back to the working directory
/// when no home is available.
pub fn default_log_path() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .map(|h| h.join(".agentdeck").join("agentdeck.log"))
        .unwrap_or_else(|| PathBuf::from("agentdeck.log"))
}

/// Install the global subscriber writing to `path` in append mode.
/// Failures are swallowed: a dashboard that cannot log still runs.
pub fn init(path: &std::path::Path) {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path);

    if let Ok(file) = file {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}
