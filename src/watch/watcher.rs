// src/watch/watcher.rs

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::errors::{KubevaliError, Result};

/// Handle for the config file watcher.
///
/// Dropping this handle stops watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Watch `config_path` and send `()` on `changes` whenever it is written,
/// created, renamed or removed.
///
/// The parent directory is watched rather than the file itself so that
/// editors which save by replacing the file keep triggering events. A path
/// that resolves through symlinks (a mounted Kubernetes ConfigMap) also
/// counts as changed whenever its resolved target moves.
pub fn spawn_config_watcher(
    config_path: impl AsRef<Path>,
    changes: mpsc::UnboundedSender<()>,
) -> Result<WatcherHandle> {
    let config_path = config_path.as_ref();
    let mut filter = ConfigChangeFilter::new(config_path)?;
    let dir = watch_dir(config_path);

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if filter.is_change(&event) {
                    debug!(?event, "config file changed");
                    // The receiver is gone once the reload loop has exited.
                    let _ = changes.send(());
                }
            }
            Err(err) => warn!(error = %err, "config watch error"),
        },
        Config::default(),
    )?;

    watcher.watch(&dir, RecursiveMode::NonRecursive)?;
    info!(path = %config_path.display(), "watching config file for changes");

    Ok(WatcherHandle { _inner: watcher })
}

/// Directory containing `config_path`, or `.` for a bare file name.
fn watch_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Decides which directory events are changes to the config file.
///
/// ConfigMap volumes publish updates by retargeting a `..data` symlink, so
/// the event names `..data` and never the config file. Each relevant event
/// re-resolves the config path and compares it with the last known target.
#[derive(Debug)]
struct ConfigChangeFilter {
    config_path: PathBuf,
    file_name: OsString,
    resolved: Option<PathBuf>,
}

impl ConfigChangeFilter {
    fn new(config_path: &Path) -> Result<Self> {
        let file_name = config_path
            .file_name()
            .map(OsString::from)
            .ok_or_else(|| {
                KubevaliError::ConfigError(format!(
                    "config path {} does not name a file",
                    config_path.display()
                ))
            })?;

        Ok(Self {
            config_path: config_path.to_path_buf(),
            file_name,
            resolved: fs::canonicalize(config_path).ok(),
        })
    }

    fn is_change(&mut self, event: &Event) -> bool {
        let relevant_kind = matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
        );
        if !relevant_kind {
            return false;
        }

        let resolved = fs::canonicalize(&self.config_path).ok();
        if resolved != self.resolved {
            debug!(from = ?self.resolved, to = ?resolved, "config path now resolves elsewhere");
            self.resolved = resolved;
            return true;
        }

        event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(self.file_name.as_os_str()))
    }
}
