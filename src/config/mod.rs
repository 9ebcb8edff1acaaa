// src/config/mod.rs

//! Configuration loading, validation and rendering for kubevali.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate settings before anything is spawned (`validate.rs`).
//! - Render the per-replica command and heartbeat target (`render.rs`).

pub mod loader;
pub mod model;
pub mod render;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{ClusterSection, ConfigFile, NodeSection, RawConfigFile, WatchlogSection};
pub use render::{render, HeartbeatTarget, RenderedCommand, RenderedNode};
