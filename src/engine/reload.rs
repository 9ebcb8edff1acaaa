// src/engine/reload.rs

//! The outermost control loop: render, run, and restart on config changes.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::cluster::StaticNodeAddresses;
use crate::config::{load_and_validate, render, HeartbeatTarget, RenderedNode};
use crate::engine::supervisor::{run_once, Outputs};
use crate::errors::{Result, FATAL_EXIT_CODE};
use crate::exec::ExecutionScope;
use crate::identity::Environment;
use crate::watch::spawn_config_watcher;
use crate::watchlog::{HeartbeatSink, HttpHeartbeat, Watchlog};

/// Settings for [`run`].
#[derive(Debug, Clone)]
pub struct ReloadOptions {
    pub config_path: PathBuf,
    /// Restart the node whenever the config file changes.
    pub watch_config: bool,
    /// Print the rendered command and exit without spawning.
    pub dry_run: bool,
}

/// Builds the heartbeat sink for a run.
pub type SinkFactory = dyn Fn(&HeartbeatTarget) -> Result<Arc<dyn HeartbeatSink>> + Send + Sync;

/// Events that interrupt a run, fed into [`run_loop`].
#[derive(Debug)]
pub struct Controls {
    /// One unit per observed config file change.
    pub changes: mpsc::UnboundedReceiver<()>,
    /// One unit per interrupt (Ctrl+C). The first stops the node gracefully;
    /// a second one while it is still stopping kills it.
    pub interrupts: mpsc::UnboundedReceiver<()>,
}

/// Run until the node exits for a reason other than a config change.
pub async fn run(opts: ReloadOptions) -> Result<i32> {
    let (change_tx, changes) = mpsc::unbounded_channel();
    let _watcher = if opts.watch_config && !opts.dry_run {
        Some(spawn_config_watcher(&opts.config_path, change_tx)?)
    } else {
        None
    };

    let (interrupt_tx, interrupts) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        loop {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = %err, "failed to listen for Ctrl+C");
                break;
            }
            if interrupt_tx.send(()).is_err() {
                break;
            }
        }
    });

    let http_sink = |target: &HeartbeatTarget| -> Result<Arc<dyn HeartbeatSink>> {
        Ok(Arc::new(HttpHeartbeat::new(target.ping_url.clone())?))
    };

    let controls = Controls { changes, interrupts };
    run_loop(&opts, &Environment::from_process(), &http_sink, controls).await
}

/// The reload loop proper, with its inputs injected.
///
/// Each unit received on `controls.changes` cancels the current run as a
/// config change. A run cancelled that way which exits with code 0 starts
/// another cycle. Any other exit ends the loop with that code.
pub async fn run_loop(
    opts: &ReloadOptions,
    env: &Environment,
    sinks: &SinkFactory,
    mut controls: Controls,
) -> Result<i32> {
    let mut cycle: u64 = 0;
    loop {
        cycle += 1;
        let node = render_node(opts, env)?;

        if opts.dry_run {
            println!("{}", node.command.shell_command());
            return Ok(0);
        }

        // One editor save can produce several events; only changes made after
        // this render may cancel the run.
        while controls.changes.try_recv().is_ok() {}

        let watchlog = match node.heartbeat.clone() {
            Some(target) => {
                let sink = sinks(&target)?;
                Some(Watchlog::new(target, sink))
            }
            None => None,
        };

        info!(cycle, index = node.identity.index, "starting node");
        let scope = ExecutionScope::new();
        let code = supervise(&node, watchlog, &scope, opts.watch_config, &mut controls).await?;

        if scope.cancelled_by_config_change() && code == 0 {
            info!(cycle, "config changed; restarting node");
            continue;
        }

        info!(cycle, exit_code = code, "node exited");
        return Ok(code);
    }
}

fn render_node(opts: &ReloadOptions, env: &Environment) -> Result<RenderedNode> {
    let cfg = load_and_validate(&opts.config_path)?;
    let nodes = StaticNodeAddresses::new(cfg.cluster.external_addresses.clone());
    render(&cfg, env, &nodes)
}

async fn supervise(
    node: &RenderedNode,
    watchlog: Option<Watchlog>,
    scope: &ExecutionScope,
    watch_config: bool,
    controls: &mut Controls,
) -> Result<i32> {
    let run = run_once(node, watchlog, Outputs::for_node(node), scope);
    tokio::pin!(run);

    let mut interrupted = false;
    loop {
        tokio::select! {
            res = &mut run => return res,
            Some(()) = controls.changes.recv(), if watch_config && !scope.is_cancelled() => {
                scope.cancel_for_config_change();
            }
            Some(()) = controls.interrupts.recv() => {
                if interrupted {
                    // Dropping the run kills the child (`kill_on_drop`).
                    warn!("second interrupt received; killing node process");
                    return Ok(FATAL_EXIT_CODE);
                }
                interrupted = true;
                info!("interrupt received; stopping node (interrupt again to kill)");
                scope.cancel();
            }
        }
    }
}
