// src/watchlog/mod.rs

//! Log-based liveness watchdog.
//!
//! Every line the child writes is copied through unchanged and checked for
//! the configured keyword. The first match arms a heartbeat timer that
//! reports immediately and then every `report_interval`. Once all streams
//! reach EOF the timer stops and, if it was ever armed, one final report is
//! sent.

pub mod heartbeat;
pub mod state;

use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::HeartbeatTarget;

pub use heartbeat::{HeartbeatReport, HeartbeatSink, HttpHeartbeat};
pub use state::{classify, HealthStatus, WatchdogState};

/// Bytes read from the child per pass.
const READ_CHUNK: usize = 8 * 1024;

/// Longest line kept for keyword matching. Longer output is matched in
/// pieces of this size.
pub const MAX_LINE: usize = 64 * 1024;

/// Watchdog for a single supervisor run. Clones share state.
#[derive(Clone)]
pub struct Watchlog {
    inner: Arc<Inner>,
}

struct Inner {
    target: HeartbeatTarget,
    sink: Arc<dyn HeartbeatSink>,
    state: Mutex<WatchdogState>,
    armed: Notify,
}

impl Watchlog {
    pub fn new(target: HeartbeatTarget, sink: Arc<dyn HeartbeatSink>) -> Self {
        info!(healthcheck_id = %target.id, keyword = %target.keyword, "watchlog enabled");
        Self {
            inner: Arc::new(Inner {
                target,
                sink,
                state: Mutex::new(WatchdogState::default()),
                armed: Notify::new(),
            }),
        }
    }

    pub fn target(&self) -> &HeartbeatTarget {
        &self.inner.target
    }

    fn state(&self) -> MutexGuard<'_, WatchdogState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_armed(&self) -> bool {
        self.state().is_armed()
    }

    /// Copy `reader` to `writer` until EOF, recording keyword matches along
    /// the way.
    ///
    /// Bytes are forwarded as soon as they are read, so a prompt without a
    /// trailing newline is not held back. Lines are reassembled on the side
    /// for matching; one longer than [`MAX_LINE`] is checked and dropped in
    /// pieces. If `writer` fails the stream is still drained and scanned so
    /// the child never blocks on a full pipe.
    pub async fn scan<R, W>(&self, mut reader: R, label: &str, mut writer: W) -> io::Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut chunk = vec![0u8; READ_CHUNK];
        let mut pending: Vec<u8> = Vec::new();
        let mut writable = true;

        loop {
            let n = reader.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            let bytes = &chunk[..n];

            if writable {
                if let Err(err) = write_chunk(&mut writer, bytes).await {
                    warn!(stream = label, error = %err, "failed to copy child output; discarding the rest");
                    writable = false;
                }
            }

            pending.extend_from_slice(bytes);
            let mut start = 0;
            while let Some(pos) = pending[start..].iter().position(|&b| b == b'\n') {
                self.check_line(label, &pending[start..start + pos]);
                start += pos + 1;
            }
            pending.drain(..start);

            if pending.len() >= MAX_LINE {
                self.check_line(label, &pending);
                pending.clear();
            }
        }

        if !pending.is_empty() {
            self.check_line(label, &pending);
        }

        debug!(stream = label, "scanner hit EOF");
        Ok(())
    }

    fn check_line(&self, label: &str, line: &[u8]) {
        let line = String::from_utf8_lossy(line);
        let line = line.trim_end_matches('\r');
        if line.contains(self.inner.target.keyword.as_str()) {
            self.record_match(label, line);
        }
    }

    /// Record a match at the current instant and arm the timer on the first
    /// one.
    pub fn record_match(&self, label: &str, line: &str) {
        let first = self.state().record_match(Instant::now(), line);
        if first {
            info!(stream = label, keyword = %self.inner.target.keyword, "found keyword for the first time");
            self.inner.armed.notify_one();
        } else {
            debug!(stream = label, "found keyword");
        }
    }

    /// Spawn a scanner for one stream onto `scanners`.
    pub fn spawn_scanner<R, W>(&self, scanners: &mut JoinSet<()>, reader: R, label: &'static str, writer: W)
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let this = self.clone();
        scanners.spawn(async move {
            if let Err(err) = this.scan(reader, label, writer).await {
                warn!(stream = label, error = %err, "failed reading child output");
            }
        });
    }

    /// The report that would be sent right now, or `None` before the first
    /// match.
    pub fn build_report(&self) -> Option<HeartbeatReport> {
        let state = self.state();
        let last = state.last_match_at()?;
        let target = &self.inner.target;
        let elapsed = Instant::now().saturating_duration_since(last);

        Some(HeartbeatReport {
            id: target.id.clone(),
            status: classify(elapsed, target.threshold),
            elapsed,
            threshold: target.threshold,
            last_line: state.last_matched_line().to_string(),
        })
    }

    /// Send one heartbeat. Failures are logged and otherwise ignored.
    pub async fn report_now(&self) {
        let Some(report) = self.build_report() else {
            return;
        };

        debug!(status = %report.status, "{}", report.status_line());
        if let Err(err) = self.inner.sink.send(report).await {
            warn!(error = %err, "failed to send heartbeat");
        }
    }

    fn spawn_report(&self) {
        let this = self.clone();
        tokio::spawn(async move { this.report_now().await });
    }

    async fn heartbeat_timer(&self) {
        self.inner.armed.notified().await;
        debug!(interval = ?self.inner.target.report_interval, "heartbeat timer starting");

        let mut ticker = time::interval(self.inner.target.report_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.spawn_report();
        }
    }

    /// Run the heartbeat timer until every scanner in `scanners` finishes,
    /// then send the final report if the watchdog was armed.
    pub async fn supervise(&self, mut scanners: JoinSet<()>) {
        let all_done = async {
            while let Some(joined) = scanners.join_next().await {
                if let Err(err) = joined {
                    warn!(error = %err, "scanner task failed");
                }
            }
        };

        tokio::select! {
            _ = all_done => {}
            _ = self.heartbeat_timer() => {}
        }
        debug!("heartbeat timer stopped");

        if self.is_armed() {
            self.report_now().await;
        }
    }
}

async fn write_chunk<W: AsyncWrite + Unpin>(writer: &mut W, bytes: &[u8]) -> io::Result<()> {
    writer.write_all(bytes).await?;
    writer.flush().await
}
