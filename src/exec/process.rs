// src/exec/process.rs

//! A single child process: spawn, stream capture, graceful stop, wait.

use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tracing::{debug, info, warn};

use crate::config::RenderedCommand;
use crate::errors::{KubevaliError, Result, FATAL_EXIT_CODE};

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    Exited(i32),
    /// Terminated by a signal, so no exit code is available.
    Signalled,
}

impl ExitOutcome {
    pub fn exit_code(self) -> i32 {
        match self {
            ExitOutcome::Exited(code) => code,
            ExitOutcome::Signalled => FATAL_EXIT_CODE,
        }
    }
}

impl From<ExitStatus> for ExitOutcome {
    fn from(status: ExitStatus) -> Self {
        match status.code() {
            Some(code) => ExitOutcome::Exited(code),
            None => ExitOutcome::Signalled,
        }
    }
}

/// Owns the running child. Stdin is inherited; stdout and stderr are piped
/// and handed out once each through [`take_stdout`](Self::take_stdout) and
/// [`take_stderr`](Self::take_stderr).
#[derive(Debug)]
pub struct ProcessHandle {
    child: Child,
    stop_requested: bool,
}

impl ProcessHandle {
    pub fn start(command: &RenderedCommand) -> Result<Self> {
        let mut cmd = Command::new(&command.path);
        cmd.args(&command.args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|source| KubevaliError::Spawn {
            path: command.path.clone(),
            source,
        })?;

        info!(pid = child.id(), command = %command, "started node process");
        Ok(Self {
            child,
            stop_requested: false,
        })
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Ask the child to terminate. Only the first call has an effect.
    ///
    /// On Unix this sends SIGTERM and leaves shutdown to the child. Elsewhere
    /// the child is killed outright.
    pub fn request_stop(&mut self) {
        if self.stop_requested {
            return;
        }
        self.stop_requested = true;

        let Some(pid) = self.child.id() else {
            debug!("stop requested after child already exited");
            return;
        };

        info!(pid, "stopping node process");
        if let Err(err) = self.send_stop(pid) {
            warn!(pid, error = %err, "failed to signal node process");
        }
    }

    #[cfg(unix)]
    fn send_stop(&mut self, pid: u32) -> std::io::Result<()> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let pid = i32::try_from(pid).map_err(std::io::Error::other)?;
        kill(Pid::from_raw(pid), Signal::SIGTERM).map_err(std::io::Error::from)
    }

    #[cfg(not(unix))]
    fn send_stop(&mut self, _pid: u32) -> std::io::Result<()> {
        self.child.start_kill()
    }

    /// Wait for the child to exit.
    pub async fn wait(&mut self) -> Result<ExitOutcome> {
        let status = self.child.wait().await.map_err(KubevaliError::Wait)?;
        let outcome = ExitOutcome::from(status);
        info!(?outcome, "node process exited");
        Ok(outcome)
    }
}
