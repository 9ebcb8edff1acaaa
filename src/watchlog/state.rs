// src/watchlog/state.rs

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

/// When the keyword was last seen, and on which line.
///
/// Shared by the stream scanners, the heartbeat timer and the reporter
/// behind a single mutex.
#[derive(Debug, Default)]
pub struct WatchdogState {
    last_match_at: Option<Instant>,
    last_matched_line: String,
}

impl WatchdogState {
    /// Record a keyword match. Returns `true` for the first match of the run,
    /// which is the moment the watchdog arms.
    pub fn record_match(&mut self, at: Instant, line: &str) -> bool {
        let first = self.last_match_at.is_none();
        // Scanners race on the lock; never move the timestamp backwards.
        let at = self.last_match_at.map_or(at, |prev| prev.max(at));
        self.last_match_at = Some(at);
        self.last_matched_line.clear();
        self.last_matched_line.push_str(line);
        first
    }

    pub fn is_armed(&self) -> bool {
        self.last_match_at.is_some()
    }

    pub fn last_match_at(&self) -> Option<Instant> {
        self.last_match_at
    }

    pub fn last_matched_line(&self) -> &str {
        &self.last_matched_line
    }
}

/// Result of comparing the time since the last match with the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Last match is more recent than the threshold.
    Alive,
    /// Last match is at least `threshold` old.
    Overdue,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Alive => f.write_str("below"),
            HealthStatus::Overdue => f.write_str("above"),
        }
    }
}

pub fn classify(elapsed: Duration, threshold: Duration) -> HealthStatus {
    if elapsed < threshold {
        HealthStatus::Alive
    } else {
        HealthStatus::Overdue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_boundary_is_a_failure() {
        let threshold = Duration::from_secs(60);
        assert_eq!(classify(Duration::from_secs(59), threshold), HealthStatus::Alive);
        assert_eq!(classify(threshold, threshold), HealthStatus::Overdue);
        assert_eq!(classify(Duration::from_secs(61), threshold), HealthStatus::Overdue);
    }

    #[test]
    fn first_match_arms_once() {
        let mut state = WatchdogState::default();
        let now = Instant::now();
        assert!(!state.is_armed());
        assert!(state.record_match(now, "ready 1"));
        assert!(!state.record_match(now, "ready 2"));
        assert!(state.is_armed());
        assert_eq!(state.last_matched_line(), "ready 2");
    }

    #[test]
    fn last_match_never_moves_backwards() {
        let mut state = WatchdogState::default();
        let later = Instant::now() + Duration::from_secs(5);
        state.record_match(later, "a");
        state.record_match(later - Duration::from_secs(1), "b");
        assert_eq!(state.last_match_at(), Some(later));
    }
}
