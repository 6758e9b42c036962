//! jgdb — an interactive GDB front end with a structured side-channel.
//!
//! Spawns GDB, shows its console, and extracts the packets the
//! debugger-side script embeds in the output stream to track position
//! and context while you debug.

mod config;
mod console;
mod logging;

use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::info;

use jgdb_session::{SessionConfig, SessionManager};

const DEFAULT_CONFIG_FILE: &str = "jgdb.toml";

/// Command line: `jgdb [--config <path>] [program]`.
struct CliArgs {
    config_path: PathBuf,
    program: Option<PathBuf>,
}

fn parse_args(args: &[String]) -> Result<CliArgs> {
    let mut config_path = PathBuf::from(DEFAULT_CONFIG_FILE);
    let mut program = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                config_path =
                    PathBuf::from(iter.next().context("--config requires a path")?);
            }
            other if !other.starts_with('-') => program = Some(PathBuf::from(other)),
            other => bail!("unknown flag: {other}"),
        }
    }
    Ok(CliArgs {
        config_path,
        program,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let cli = parse_args(&args)?;

    let mut config = config::load(&cli.config_path)?;
    if cli.program.is_some() {
        config.program = cli.program;
    }

    let log_path = config
        .log_file
        .clone()
        .unwrap_or_else(logging::default_log_path);
    logging::init(&log_path, &config.log_level)?;
    info!("starting {} for {:?}", config.gdb_path.display(), config.program);

    let mut manager = SessionManager::new();
    let events = manager
        .start(SessionConfig {
            gdb_path: config.gdb_path.clone(),
            gdb_args: config.gdb_args.clone(),
            extension_script: config.extension_script.clone(),
        })
        .await?;
    let session = manager.session().context("session just started")?;

    if let Some(program) = &config.program {
        session.load_program(program);
    }
    if config.run_directly {
        session.run();
    }

    console::run(session, events).await?;
    manager.shutdown();
    Ok(())
}
