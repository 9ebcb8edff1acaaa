//! Shared helpers for kubevali's integration tests.
//!
//! - [`builders`] writes config files without hand-assembled TOML.
//! - [`recording`] provides a heartbeat sink and an output buffer that
//!   remember what they were given.

pub mod builders;
pub mod recording;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

/// Upper bound for a single supervised run in tests. Real child processes
/// are involved, so this is generous.
pub const RUN_TIMEOUT: Duration = Duration::from_secs(5);

/// Filter used when `KUBEVALI_LOG` is unset: the supervisor's own events in
/// detail, everyone else's only when they warn.
const DEFAULT_TEST_FILTER: &str = "kubevali=debug,warn";

static LOGGING: Once = Once::new();

/// Install a test-captured subscriber once per test binary.
///
/// Reads the same `KUBEVALI_LOG` variable as the binary, but accepts full
/// filter directives (`KUBEVALI_LOG=kubevali::watchlog=trace`). Output only
/// shows for failing tests unless run with `--nocapture`.
pub fn init_tracing() {
    LOGGING.call_once(|| {
        let filter = EnvFilter::try_from_env("KUBEVALI_LOG")
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_TEST_FILTER));

        // Another harness may already own the global subscriber.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Await `run`, panicking if it takes longer than [`RUN_TIMEOUT`].
///
/// A supervisor that never returns is a failure, not a hung test run.
pub async fn with_timeout<F: Future>(run: F) -> F::Output {
    match tokio::time::timeout(RUN_TIMEOUT, run).await {
        Ok(output) => output,
        Err(_) => panic!("supervised run did not finish within {RUN_TIMEOUT:?}"),
    }
}
