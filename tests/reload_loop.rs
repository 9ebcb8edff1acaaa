#![cfg(unix)]

mod common;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use common::{replica_env, write_config, TestResult};
use kubevali::config::HeartbeatTarget;
use kubevali::engine::{run_loop, Controls, ReloadOptions};
use kubevali::errors::{KubevaliError, Result};
use kubevali::watchlog::HeartbeatSink;
use kubevali_test_utils::recording::RecordingHeartbeat;
use tokio::sync::mpsc;

const LOOPING_NODE: &str = r#"
[node]
command = ["sh", "-c", "trap 'exit 0' TERM; while :; do sleep 0.05; done"]
"#;

fn options(path: PathBuf) -> ReloadOptions {
    ReloadOptions {
        config_path: path,
        watch_config: true,
        dry_run: false,
    }
}

fn recording_sinks(target: &HeartbeatTarget) -> Result<Arc<dyn HeartbeatSink>> {
    assert_eq!(target.id, "id-0");
    Ok(Arc::new(RecordingHeartbeat::new()))
}

async fn run_with_timeout(
    opts: ReloadOptions,
    changes: mpsc::UnboundedReceiver<()>,
) -> Result<i32> {
    let (_interrupt_tx, interrupts) = mpsc::unbounded_channel();
    run_controlled(opts, Controls { changes, interrupts }).await
}

async fn run_controlled(opts: ReloadOptions, controls: Controls) -> Result<i32> {
    let env = replica_env(0);
    tokio::time::timeout(
        Duration::from_secs(20),
        run_loop(&opts, &env, &recording_sinks, controls),
    )
    .await
    .expect("reload loop timed out")
}

#[tokio::test]
async fn single_cycle_returns_the_exit_code() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("kubevali.toml");
    write_config(&path, "[node]\ncommand = [\"sh\", \"-c\", \"exit {{ add .Index 3 }}\"]\n");

    let mut opts = options(path);
    opts.watch_config = false;
    let (_tx, rx) = mpsc::unbounded_channel();
    assert_eq!(run_with_timeout(opts, rx).await?, 3);
    Ok(())
}

#[tokio::test]
async fn dry_run_does_not_spawn() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("kubevali.toml");
    write_config(&path, "[node]\ncommand = [\"sh\", \"-c\", \"exit 9\"]\n");

    let mut opts = options(path);
    opts.dry_run = true;
    let (_tx, rx) = mpsc::unbounded_channel();
    assert_eq!(run_with_timeout(opts, rx).await?, 0);
    Ok(())
}

#[tokio::test]
async fn config_change_restarts_with_the_new_config() -> TestResult {
    common::init_tracing();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("kubevali.toml");
    write_config(&path, LOOPING_NODE);

    let (tx, rx) = mpsc::unbounded_channel();
    let run = tokio::spawn(run_with_timeout(options(path.clone()), rx));

    tokio::time::sleep(Duration::from_millis(400)).await;
    write_config(
        &path,
        r#"
[node]
command = ["sh", "-c", "exit 7"]

[watchlog]
enabled = true
keyword = "ready"
healthcheck_ids = ["id-0"]
"#,
    );
    // A burst of events counts as one change.
    tx.send(())?;
    tx.send(())?;

    assert_eq!(run.await??, 7);
    Ok(())
}

#[tokio::test]
async fn unclean_exit_after_change_is_final() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("kubevali.toml");
    write_config(&path, "[node]\ncommand = [\"sh\", \"-c\", \"exec sleep 30\"]\n");

    let (tx, rx) = mpsc::unbounded_channel();
    let run = tokio::spawn(run_with_timeout(options(path), rx));

    tokio::time::sleep(Duration::from_millis(300)).await;
    tx.send(())?;

    assert_eq!(run.await??, 1);
    Ok(())
}

#[tokio::test]
async fn invalid_config_on_reload_is_fatal() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("kubevali.toml");
    write_config(&path, LOOPING_NODE);

    let (tx, rx) = mpsc::unbounded_channel();
    let run = tokio::spawn(run_with_timeout(options(path.clone()), rx));

    tokio::time::sleep(Duration::from_millis(400)).await;
    write_config(&path, "[node]\ncommand = []\n");
    tx.send(())?;

    assert!(matches!(run.await?, Err(KubevaliError::ConfigError(_))));
    Ok(())
}

#[tokio::test]
async fn interrupt_stops_without_restarting() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("kubevali.toml");
    write_config(&path, LOOPING_NODE);

    let (change_tx, changes) = mpsc::unbounded_channel();
    let (interrupt_tx, interrupts) = mpsc::unbounded_channel();
    let run = tokio::spawn(run_controlled(options(path), Controls { changes, interrupts }));

    tokio::time::sleep(Duration::from_millis(400)).await;
    // A change racing the interrupt must not turn the stop into a restart.
    interrupt_tx.send(())?;
    change_tx.send(())?;

    assert_eq!(run.await??, 0);
    Ok(())
}

#[tokio::test]
async fn second_interrupt_kills_a_stubborn_node() -> TestResult {
    common::init_tracing();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("kubevali.toml");
    write_config(
        &path,
        "[node]\ncommand = [\"sh\", \"-c\", \"trap '' TERM; while :; do sleep 0.05; done\"]\n",
    );

    let (_change_tx, changes) = mpsc::unbounded_channel();
    let (interrupt_tx, interrupts) = mpsc::unbounded_channel();
    let run = tokio::spawn(run_controlled(options(path), Controls { changes, interrupts }));

    tokio::time::sleep(Duration::from_millis(400)).await;
    interrupt_tx.send(())?;
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!run.is_finished(), "SIGTERM is ignored, so the node keeps running");

    interrupt_tx.send(())?;
    let code = tokio::time::timeout(Duration::from_secs(5), run).await???;
    assert_eq!(code, 1);
    Ok(())
}
