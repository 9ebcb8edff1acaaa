// src/engine/mod.rs

//! Orchestration for kubevali.
//!
//! - [`supervisor`] runs the node once: spawn, output pumping, cancellation.
//! - [`reload`] is the outer loop that re-renders the config and restarts the
//!   node after a config change.

pub mod reload;
pub mod supervisor;

pub use reload::{run, run_loop, Controls, ReloadOptions};
pub use supervisor::{run_once, Outputs};
