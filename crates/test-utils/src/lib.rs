//! Shared helpers for extask integration tests.
//!
//! - [`init_test_tracing`]: idempotent tracing setup
//! - [`wait_until`]: poll a condition with a deadline
//! - [`worker_test!`]: async test with tracing initialized

use std::future::Future;
use std::time::Duration;

use anyhow::{Result, anyhow};

/// Initialize tracing for tests. Safe to call multiple times.
///
/// Defaults to `extask=debug`; `RUST_LOG` overrides it. The `try_init()`
/// call is idempotent, so later calls are no-ops.
pub fn init_test_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("extask=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Poll until condition returns `Some(T)` or timeout expires.
pub async fn wait_until<F, Fut, T>(timeout: Duration, interval: Duration, check: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        if let Some(result) = check().await? {
            return Ok(result);
        }

        if tokio::time::Instant::now() > deadline {
            return Err(anyhow!("timeout waiting for condition"));
        }

        tokio::time::sleep(interval).await;
    }
}

/// Macro to define an async worker test.
///
/// Usage:
///
/// ```ignore
/// use test_utils::worker_test;
///
/// worker_test!(completes_task, {
///     let service = InMemoryTaskService::new();
///     // ...
///     Ok(())
/// });
/// ```
///
/// This expands to:
/// - `#[tokio::test(flavor = "multi_thread")]`
/// - an `async fn` returning `anyhow::Result<()>`
/// - a call to [`init_test_tracing`] before the body
#[macro_export]
macro_rules! worker_test {
    ($name:ident, $body:block) => {
        #[tokio::test(flavor = "multi_thread")]
        async fn $name() -> anyhow::Result<()> {
            $crate::init_test_tracing();
            $body
        }
    };
}
