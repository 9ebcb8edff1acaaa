//! In-memory stand-ins for the heartbeat endpoint and the supervisor's
//! output streams.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use kubevali::errors::{KubevaliError, Result};
use kubevali::watchlog::{HeartbeatReport, HeartbeatSink};
use tokio::io::AsyncWrite;

/// Records every report instead of sending it.
#[derive(Debug, Clone, Default)]
pub struct RecordingHeartbeat {
    reports: Arc<Mutex<Vec<HeartbeatReport>>>,
    fail: bool,
}

impl RecordingHeartbeat {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that records reports and then reports a delivery failure.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn reports(&self) -> Vec<HeartbeatReport> {
        self.reports.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.reports.lock().unwrap().len()
    }
}

impl HeartbeatSink for RecordingHeartbeat {
    fn send(&self, report: HeartbeatReport) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.reports.lock().unwrap().push(report);
            if self.fail {
                return Err(KubevaliError::Heartbeat("endpoint unavailable".to_string()));
            }
            Ok(())
        })
    }
}

/// An `AsyncWrite` that appends into a shared buffer.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Vec<u8> {
        self.bytes.lock().unwrap().clone()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }
}

impl AsyncWrite for SharedBuffer {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        self.bytes.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
