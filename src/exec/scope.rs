// src/exec/scope.rs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

/// Cancellation token for one supervisor run.
///
/// Clones share state. A scope is created fresh for every reload iteration;
/// once cancelled it stays cancelled.
#[derive(Debug, Clone)]
pub struct ExecutionScope {
    inner: Arc<ScopeInner>,
}

#[derive(Debug)]
struct ScopeInner {
    cancel_tx: watch::Sender<bool>,
    config_changed: AtomicBool,
}

impl ExecutionScope {
    pub fn new() -> Self {
        let (cancel_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(ScopeInner {
                cancel_tx,
                config_changed: AtomicBool::new(false),
            }),
        }
    }

    /// Cancel for good. Overrides an earlier config-change cancellation so
    /// the reload loop does not start another cycle.
    pub fn cancel(&self) {
        self.inner.config_changed.store(false, Ordering::SeqCst);
        self.inner.cancel_tx.send_replace(true);
    }

    /// Cancel because the configuration file changed, which lets the reload
    /// loop start another cycle. No effect on an already cancelled scope.
    pub fn cancel_for_config_change(&self) {
        if self.is_cancelled() {
            return;
        }
        self.inner.config_changed.store(true, Ordering::SeqCst);
        self.inner.cancel_tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.cancel_tx.borrow()
    }

    pub fn cancelled_by_config_change(&self) -> bool {
        self.inner.config_changed.load(Ordering::SeqCst)
    }

    /// Resolves once the scope is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.inner.cancel_tx.subscribe();
        // The sender lives as long as `self`, so this only returns on cancel.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for ExecutionScope {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn cancel_wakes_waiters() {
        let scope = ExecutionScope::new();
        let waiter = {
            let scope = scope.clone();
            tokio::spawn(async move { scope.cancelled().await })
        };

        scope.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(scope.is_cancelled());
        assert!(!scope.cancelled_by_config_change());
    }

    #[tokio::test]
    async fn already_cancelled_scope_resolves_immediately() {
        let scope = ExecutionScope::new();
        scope.cancel_for_config_change();
        scope.cancelled().await;
        assert!(scope.cancelled_by_config_change());
    }

    #[test]
    fn plain_cancel_overrides_config_change() {
        let scope = ExecutionScope::new();
        scope.cancel_for_config_change();
        scope.cancel();
        assert!(scope.is_cancelled());
        assert!(!scope.cancelled_by_config_change());

        scope.cancel_for_config_change();
        assert!(!scope.cancelled_by_config_change());
    }
}
