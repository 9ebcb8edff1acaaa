#![allow(dead_code)]

use std::io::Write;
use std::path::Path;

use kubevali::config::{RenderedCommand, RenderedNode};
use kubevali::identity::{Environment, NodeIdentity};
use kubevali::types::OutputTarget;
use tempfile::NamedTempFile;

pub use kubevali_test_utils::init_tracing;

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

/// Write `contents` to a fresh temporary `.toml` file.
pub fn config_file(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("create temp config");
    file.write_all(contents.as_bytes()).expect("write temp config");
    file
}

pub fn write_config(path: &Path, contents: &str) {
    std::fs::write(path, contents).expect("write config");
}

/// Environment for replica `index` of a StatefulSet named `pod-statefulset`.
pub fn replica_env(index: usize) -> Environment {
    Environment::isolated().with_var("HOSTNAME", format!("pod-statefulset-{index}"))
}

/// A node running `script` under `sh -c`, without a watchlog.
pub fn sh_node(script: &str) -> RenderedNode {
    RenderedNode {
        identity: NodeIdentity { index: 0 },
        command: RenderedCommand {
            path: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
        },
        stdout: OutputTarget::Stdout,
        stderr: OutputTarget::Stderr,
        heartbeat: None,
    }
}
