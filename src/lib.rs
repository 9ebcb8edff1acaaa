// src/lib.rs

pub mod cli;
pub mod cluster;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod identity;
pub mod logging;
pub mod template;
pub mod types;
pub mod watch;
pub mod watchlog;

use tracing::debug;

use crate::cli::CliArgs;
use crate::errors::Result;

/// High-level entry point used by `main.rs`.
///
/// Returns the exit code the process should terminate with: the node's own
/// exit code, or 0 after a dry run.
pub async fn run(args: CliArgs) -> Result<i32> {
    let opts = args.reload_options();
    debug!(?opts, "starting kubevali");
    engine::run(opts).await
}
