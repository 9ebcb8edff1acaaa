// src/engine/supervisor.rs

//! One supervised run: spawn the node, pump its output, wait for it.

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::config::RenderedNode;
use crate::errors::{KubevaliError, Result};
use crate::exec::{ExecutionScope, ProcessHandle};
use crate::types::OutputTarget;
use crate::watchlog::Watchlog;

pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Destinations for the child's stdout and stderr.
pub struct Outputs {
    pub stdout: BoxedWriter,
    pub stderr: BoxedWriter,
}

impl Outputs {
    /// The supervisor's own stdout/stderr, as selected in `[node]`.
    pub fn for_node(node: &RenderedNode) -> Self {
        Self {
            stdout: writer_for(node.stdout),
            stderr: writer_for(node.stderr),
        }
    }
}

fn writer_for(target: OutputTarget) -> BoxedWriter {
    match target {
        OutputTarget::Stdout => Box::new(tokio::io::stdout()),
        OutputTarget::Stderr => Box::new(tokio::io::stderr()),
    }
}

/// Run the node once and return its exit code.
///
/// Cancelling `scope` sends the child a stop request and then waits for it to
/// exit. Output is fully drained (and the final heartbeat sent) before this
/// returns.
pub async fn run_once(
    node: &RenderedNode,
    watchlog: Option<Watchlog>,
    outputs: Outputs,
    scope: &ExecutionScope,
) -> Result<i32> {
    let mut process = ProcessHandle::start(&node.command)?;

    let stdout = process
        .take_stdout()
        .ok_or_else(|| KubevaliError::Other(anyhow::anyhow!("child stdout was not captured")))?;
    let stderr = process
        .take_stderr()
        .ok_or_else(|| KubevaliError::Other(anyhow::anyhow!("child stderr was not captured")))?;

    let pumps = spawn_pumps(watchlog, stdout, stderr, outputs);

    let outcome = tokio::select! {
        res = process.wait() => res?,
        _ = scope.cancelled() => {
            info!(
                config_change = scope.cancelled_by_config_change(),
                "run cancelled; stopping node process"
            );
            process.request_stop();
            process.wait().await?
        }
    };

    if let Err(err) = pumps.await {
        warn!(error = %err, "output pump task failed");
    }

    let code = outcome.exit_code();
    debug!(exit_code = code, "run finished");
    Ok(code)
}

fn spawn_pumps<O, E>(watchlog: Option<Watchlog>, stdout: O, stderr: E, outputs: Outputs) -> JoinHandle<()>
where
    O: AsyncRead + Unpin + Send + 'static,
    E: AsyncRead + Unpin + Send + 'static,
{
    match watchlog {
        Some(watchlog) => {
            let mut scanners = JoinSet::new();
            watchlog.spawn_scanner(&mut scanners, stdout, "stdout", outputs.stdout);
            watchlog.spawn_scanner(&mut scanners, stderr, "stderr", outputs.stderr);
            tokio::spawn(async move { watchlog.supervise(scanners).await })
        }
        None => tokio::spawn(async move {
            tokio::join!(
                copy_stream(stdout, outputs.stdout, "stdout"),
                copy_stream(stderr, outputs.stderr, "stderr"),
            );
        }),
    }
}

/// Byte-for-byte copy. If the destination fails the rest of the stream is
/// discarded so the child never blocks on a full pipe.
async fn copy_stream<R, W>(mut reader: R, mut writer: W, label: &str)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    match tokio::io::copy(&mut reader, &mut writer).await {
        Ok(bytes) => debug!(stream = label, bytes, "stream closed"),
        Err(err) => {
            warn!(stream = label, error = %err, "failed to copy child output; discarding the rest");
            let _ = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await;
        }
    }
    let _ = writer.flush().await;
}
