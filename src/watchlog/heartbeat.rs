// src/watchlog/heartbeat.rs

//! Heartbeat delivery.
//!
//! The watchdog talks to a [`HeartbeatSink`] instead of an HTTP client, so
//! tests can record reports instead of sending them.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;

use crate::errors::{KubevaliError, Result};

use super::state::HealthStatus;

/// Client timeout for a single heartbeat request.
pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(10);

/// One liveness report for a healthcheck.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatReport {
    pub id: String,
    pub status: HealthStatus,
    pub elapsed: Duration,
    pub threshold: Duration,
    pub last_line: String,
}

impl HeartbeatReport {
    /// `{base}/{id}` when alive, `{base}/{id}/fail` when overdue.
    pub fn url(&self, base: &str) -> String {
        let base = base.trim_end_matches('/');
        match self.status {
            HealthStatus::Alive => format!("{base}/{}", self.id),
            HealthStatus::Overdue => format!("{base}/{}/fail", self.id),
        }
    }

    pub fn status_line(&self) -> String {
        format!(
            "Watchlog: {:?} since last detected keyword, {} threshold {:?}",
            self.elapsed, self.status, self.threshold
        )
    }

    /// Status line, a blank line, then the last matched output line.
    pub fn body(&self) -> String {
        format!("{}\n\n{}", self.status_line(), self.last_line)
    }
}

/// Where heartbeat reports go.
pub trait HeartbeatSink: Send + Sync {
    fn send(&self, report: HeartbeatReport) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Posts reports to a healthchecks.io-style ping endpoint.
#[derive(Debug, Clone)]
pub struct HttpHeartbeat {
    client: reqwest::Client,
    ping_url: String,
}

impl HttpHeartbeat {
    pub fn new(ping_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(HEARTBEAT_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            ping_url: ping_url.into(),
        })
    }
}

impl HeartbeatSink for HttpHeartbeat {
    fn send(&self, report: HeartbeatReport) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let url = report.url(&self.ping_url);
            let response = self
                .client
                .post(&url)
                .header(CONTENT_TYPE, "text/plain")
                .body(report.body())
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                return Err(KubevaliError::Heartbeat(format!(
                    "{url} answered with status {status}"
                )));
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(status: HealthStatus) -> HeartbeatReport {
        HeartbeatReport {
            id: "abc".to_string(),
            status,
            elapsed: Duration::from_secs(61),
            threshold: Duration::from_secs(60),
            last_line: "block imported".to_string(),
        }
    }

    #[test]
    fn url_depends_on_status() {
        assert_eq!(report(HealthStatus::Alive).url("https://hc-ping.com/"), "https://hc-ping.com/abc");
        assert_eq!(report(HealthStatus::Overdue).url("https://hc-ping.com"), "https://hc-ping.com/abc/fail");
    }

    #[test]
    fn body_has_status_line_then_last_line() {
        assert_eq!(
            report(HealthStatus::Overdue).body(),
            "Watchlog: 61s since last detected keyword, above threshold 60s\n\nblock imported"
        );
    }
}
