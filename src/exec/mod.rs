// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`process`] wraps one child process: spawn, stream hand-off, SIGTERM,
//!   wait.
//! - [`scope`] holds the per-run cancellation token.

pub mod process;
pub mod scope;

pub use process::{ExitOutcome, ProcessHandle};
pub use scope::ExecutionScope;
