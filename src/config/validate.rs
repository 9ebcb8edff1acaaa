// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{KubevaliError, Result};

/// Smallest `last_threshold` accepted.
pub const MIN_LAST_THRESHOLD: Duration = Duration::from_secs(1);

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = KubevaliError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_command(cfg)?;
    validate_args(cfg)?;
    validate_watchlog(cfg)?;
    Ok(())
}

fn ensure_has_command(cfg: &RawConfigFile) -> Result<()> {
    if cfg.node.command.is_empty() {
        return Err(KubevaliError::ConfigError(
            "[node].command must contain at least one element".to_string(),
        ));
    }
    Ok(())
}

fn validate_args(cfg: &RawConfigFile) -> Result<()> {
    for flag in cfg.node.args.keys() {
        if flag.trim().is_empty() || flag.starts_with('-') {
            return Err(KubevaliError::ConfigError(format!(
                "[node.args] flag name {flag:?} must be non-empty and given without leading dashes"
            )));
        }
    }
    Ok(())
}

fn validate_watchlog(cfg: &RawConfigFile) -> Result<()> {
    let watchlog = &cfg.watchlog;
    if !watchlog.enabled {
        return Ok(());
    }

    if watchlog.keyword.is_empty() {
        return Err(KubevaliError::ConfigError(
            "[watchlog].keyword must be set when watchlog is enabled".to_string(),
        ));
    }

    if watchlog.last_threshold.as_duration() < MIN_LAST_THRESHOLD {
        return Err(KubevaliError::ConfigError(format!(
            "[watchlog].last_threshold must be at least 1s (got {})",
            watchlog.last_threshold
        )));
    }

    if watchlog.report_interval.as_duration().is_zero() {
        return Err(KubevaliError::ConfigError(
            "[watchlog].report_interval must be greater than zero".to_string(),
        ));
    }

    if watchlog.ping_url.trim().is_empty() {
        return Err(KubevaliError::ConfigError(
            "[watchlog].ping_url must not be empty".to_string(),
        ));
    }

    Ok(())
}
