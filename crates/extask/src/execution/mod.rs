//! Task execution and outcome dispatch.
//!
//! - [`TaskExecutor`]: resolves arguments, invokes the handler and classifies the result
//! - [`dispatch`]: turns an [`Outcome`] into exactly one task service call
//! - [`RetryPolicy`]: retry budget and backoff for technical failures

mod dispatcher;
mod executor;
mod outcome;
mod retry;

pub use dispatcher::dispatch;
pub use executor::TaskExecutor;
pub use outcome::{ExecutionError, Outcome};
pub use retry::{RetryPolicy, RetrySchedule};
