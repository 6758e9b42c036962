//! jgdb configuration.
//!
//! Loaded from a `jgdb.toml` file; every field has a default so a missing
//! file simply yields the defaults. Validation rejects combinations the
//! session layer cannot honor.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// Recognized log level names.
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Front-end configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Path to the debugger binary.
    pub gdb_path: PathBuf,
    /// Extra arguments passed to the debugger.
    pub gdb_args: Vec<String>,
    /// Debugger-side extension script sourced at startup.
    pub extension_script: Option<PathBuf>,
    /// Program to load with `file` after startup.
    pub program: Option<PathBuf>,
    /// Issue `run` immediately after loading the program.
    pub run_directly: bool,
    /// Log level for the log file.
    pub log_level: String,
    /// Log file path; a default under the user's data dir when unset.
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gdb_path: PathBuf::from("gdb"),
            gdb_args: Vec::new(),
            extension_script: None,
            program: None,
            run_directly: false,
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

/// Load the configuration from `path`.
///
/// A missing file yields defaults; a present file must parse and
/// validate.
pub fn load(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("could not read {}", path.display()))?;
    load_from_str(&content).with_context(|| format!("invalid config {}", path.display()))
}

/// Parse a TOML string into a validated [`Config`].
pub fn load_from_str(toml_str: &str) -> Result<Config> {
    let config: Config = toml::from_str(toml_str)?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if !LOG_LEVELS.contains(&config.log_level.as_str()) {
        bail!(
            "log_level must be one of {:?}, got {:?}",
            LOG_LEVELS,
            config.log_level
        );
    }
    if config.run_directly && config.program.is_none() {
        bail!("run_directly requires a program");
    }
    if config.gdb_path.as_os_str().is_empty() {
        bail!("gdb_path must not be empty");
    }
    Ok(())
}
