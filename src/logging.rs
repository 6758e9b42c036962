//! File-backed logging for the interactive front end.
//!
//! The console owns the terminal, so diagnostics go to a log file rather
//! than stderr. The subscriber is set up here and only here; the library
//! crates just emit `tracing` events.

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

/// Platform default for the log file.
///
/// * Linux: `$HOME/.local/share/jgdb/jgdb.log`
/// * macOS: `$HOME/Library/Logs/jgdb/jgdb.log`
/// * Fallback: `/tmp/jgdb/jgdb.log`
pub fn default_log_path() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join("Library/Logs/jgdb/jgdb.log");
        }
    }
    #[cfg(not(target_os = "macos"))]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(".local/share/jgdb/jgdb.log");
        }
    }
    PathBuf::from("/tmp/jgdb/jgdb.log")
}

/// Create the log file's parent directory if needed.
pub fn ensure_log_dir(log_path: &Path) -> io::Result<()> {
    if let Some(parent) = log_path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Install the global subscriber, writing to `log_path` at `level`.
///
/// `RUST_LOG` overrides the configured level when set.
pub fn init(log_path: &Path, level: &str) -> Result<()> {
    ensure_log_dir(log_path)
        .with_context(|| format!("could not create log dir for {}", log_path.display()))?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("could not open log file {}", log_path.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}
