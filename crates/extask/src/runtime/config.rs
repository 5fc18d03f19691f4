//! Worker configuration.

use std::time::Duration;

use crate::execution::RetryPolicy;

/// Configuration for the task worker runtime.
///
/// Controls polling, locking, retry behavior, and worker concurrency.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use extask::WorkerConfig;
///
/// let config = WorkerConfig {
///     worker_id: Some("billing-worker".into()),
///     poll_interval: Duration::from_millis(100),
///     lock_duration: Duration::from_secs(60),
///     workers: 4, // Four independent fetch loops
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Worker identifier presented to the task service.
    ///
    /// If `None`, a UUID is generated when the runtime is built.
    pub worker_id: Option<String>,

    /// Maximum number of tasks fetched per poll. Default: 10.
    pub max_tasks: usize,

    /// How long fetched tasks stay locked.
    ///
    /// Handler descriptors may override this per topic.
    /// Default: 30 seconds.
    pub lock_duration: Duration,

    /// Fetch higher priority tasks first. Default: true.
    pub use_priority: bool,

    /// How often to poll for tasks. Must be non-zero. Default: 500ms.
    pub poll_interval: Duration,

    /// Maximum time to wait for in-flight batches during shutdown.
    ///
    /// Default: 30 seconds.
    pub shutdown_timeout: Duration,

    /// Number of task workers to spawn.
    ///
    /// Each worker fetches and locks independently under its own worker
    /// id (`<worker_id>-<n>` when more than one). Default: 1.
    pub workers: usize,

    /// Retry policy for technical failures.
    pub retry_policy: RetryPolicy,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: None,
            max_tasks: 10,
            lock_duration: Duration::from_secs(30),
            use_priority: true,
            poll_interval: Duration::from_millis(500),
            shutdown_timeout: Duration::from_secs(30),
            workers: 1,
            retry_policy: RetryPolicy::default(),
        }
    }
}
