//! Retry budget and backoff for technical failures.

use std::time::Duration;

/// Retry configuration applied when reporting technical failures.
///
/// The first failure of a task initializes its retry budget to
/// `max_retries`; every failure after that counts the budget down. Once the
/// reported budget reaches zero the task service raises an incident instead
/// of retrying.
///
/// # Backoff Calculation
///
/// With `consumed = max_retries - current_retries`:
///
/// - backoff disabled: `base_timeout`
/// - backoff enabled: `base_timeout * backoff_multiplier^consumed`
///
/// With defaults (3 retries, 60s base, multiplier 2.0):
/// - First failure: 2 retries left, 60s delay
/// - Second failure: 1 retry left, 120s delay
/// - Third failure: 0 retries left, 240s delay (incident)
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use extask::RetryPolicy;
///
/// let policy = RetryPolicy::default();
/// let first = policy.schedule(None);
/// assert_eq!(first.remaining_retries, 2);
/// assert_eq!(first.retry_timeout, Duration::from_secs(60));
///
/// let second = policy.schedule(Some(first.remaining_retries));
/// assert_eq!(second.remaining_retries, 1);
/// assert_eq!(second.retry_timeout, Duration::from_secs(120));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retry budget assigned on the first technical failure. Default: 3.
    pub max_retries: u32,

    /// Delay before a failed task becomes fetchable again. Default: 60 seconds.
    pub base_timeout: Duration,

    /// Scale the delay by the number of attempts already consumed. Default: true.
    pub use_exponential_backoff: bool,

    /// Per-attempt multiplier. Default: 2.0.
    ///
    /// Non-finite or non-positive values are treated as 1.0.
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_timeout: Duration::from_secs(60),
            use_exponential_backoff: true,
            backoff_multiplier: 2.0,
        }
    }
}

/// Values reported with a technical failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySchedule {
    /// Remaining retry budget after this failure.
    pub remaining_retries: u32,
    /// Delay before the task may be fetched again.
    pub retry_timeout: Duration,
}

impl RetryPolicy {
    /// Compute the schedule for a failure of a task whose remaining retry
    /// count is `current` (`None` on the first failure).
    pub fn schedule(&self, current: Option<u32>) -> RetrySchedule {
        let current = current.unwrap_or(self.max_retries);
        RetrySchedule {
            remaining_retries: current.saturating_sub(1),
            retry_timeout: self.retry_timeout(current),
        }
    }

    /// Delay for a failure when `current` retries were left.
    pub fn retry_timeout(&self, current: u32) -> Duration {
        if !self.use_exponential_backoff {
            return self.base_timeout;
        }

        let consumed = self.max_retries.saturating_sub(current);
        let exponent = i32::try_from(consumed).unwrap_or(i32::MAX);
        let millis = self.base_timeout.as_millis() as f64 * self.multiplier().powi(exponent);

        // `as` saturates at u64::MAX for large and infinite values.
        Duration::from_millis(millis as u64)
    }

    fn multiplier(&self) -> f64 {
        if self.backoff_multiplier.is_finite() && self.backoff_multiplier > 0.0 {
            self.backoff_multiplier
        } else {
            1.0
        }
    }
}
