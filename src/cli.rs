// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::engine::ReloadOptions;

/// Command-line arguments for `kubevali`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "kubevali",
    version,
    about = "Render a per-replica node command, supervise it and report log-based liveness.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    #[arg(short, long, value_name = "PATH", default_value = "kubevali.toml")]
    pub config: PathBuf,

    /// Restart the node whenever the config file changes.
    #[arg(short, long)]
    pub watch_config: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `KUBEVALI_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Render and print the node command, but don't run it.
    #[arg(long)]
    pub dry_run: bool,
}

impl CliArgs {
    pub fn reload_options(&self) -> ReloadOptions {
        ReloadOptions {
            config_path: self.config.clone(),
            watch_config: self.watch_config,
            dry_run: self.dry_run,
        }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
