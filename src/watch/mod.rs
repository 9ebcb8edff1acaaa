// src/watch/mod.rs

//! Config file watching.
//!
//! Turns filesystem events for the configuration file into unit change
//! notifications for the reload loop. It does not read or parse the file.

pub mod watcher;

pub use watcher::{spawn_config_watcher, WatcherHandle};
