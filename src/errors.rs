// src/errors.rs

//! Crate-wide error type.
//!
//! Every component returns [`Result`]; only `main` decides to terminate the
//! process, using [`KubevaliError`] to pick a diagnostic.

use thiserror::Error;

use crate::template::TemplateError;

/// Exit code used when the supervisor itself fails (render error, spawn
/// failure, invalid config, ...), as opposed to the child's own exit code.
pub const FATAL_EXIT_CODE: i32 = 1;

#[derive(Error, Debug)]
pub enum KubevaliError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("unable to convert rendered node index {rendered:?} to an integer: {source}")]
    InvalidIndex {
        rendered: String,
        #[source]
        source: std::num::ParseIntError,
    },

    #[error("not enough healthcheck IDs: expected at least {expected}, got {got}")]
    NotEnoughHealthcheckIds { expected: usize, got: usize },

    #[error("failed to spawn {path:?}: {source}")]
    Spawn {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed waiting for child process: {0}")]
    Wait(#[source] std::io::Error),

    #[error("heartbeat delivery failed: {0}")]
    Heartbeat(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("file watch error: {0}")]
    Notify(#[from] notify::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<reqwest::Error> for KubevaliError {
    fn from(err: reqwest::Error) -> Self {
        KubevaliError::Heartbeat(err.to_string())
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, KubevaliError>;
