//! Outcome dispatch: one task service call per outcome.

use tracing::debug;

use super::outcome::Outcome;
use super::retry::RetryPolicy;
use crate::error::Result;
use crate::service::TaskService;
use crate::task::{ExternalTask, Variables};

/// Report `outcome` for `task` to the task service.
///
/// Issues exactly one call:
///
/// | Outcome | Call |
/// |---------|------|
/// | `Success` | [`TaskService::complete`] with the output variables |
/// | `BusinessError` | [`TaskService::report_business_error`] with empty variables |
/// | `TechnicalFailure` | [`TaskService::report_failure`] with the retry schedule from `policy` |
///
/// # Errors
///
/// Returns whatever the task service call returns. The call is not retried.
pub async fn dispatch<S>(
    service: &S,
    task: &ExternalTask,
    outcome: Outcome,
    policy: &RetryPolicy,
) -> Result<()>
where
    S: TaskService,
{
    match outcome {
        Outcome::Success { variables } => {
            debug!(task_id = %task.id(), "Completing task");
            service.complete(task, variables).await
        }
        Outcome::BusinessError { code, message } => {
            debug!(task_id = %task.id(), code = %code, "Reporting business error");
            service
                .report_business_error(task, &code, message.as_deref(), Variables::new())
                .await
        }
        Outcome::TechnicalFailure { message, details } => {
            let schedule = policy.schedule(task.retries());
            debug!(
                task_id = %task.id(),
                remaining_retries = schedule.remaining_retries,
                retry_timeout_ms = schedule.retry_timeout.as_millis() as u64,
                "Reporting failure"
            );
            service
                .report_failure(
                    task,
                    &message,
                    &details,
                    schedule.remaining_retries,
                    schedule.retry_timeout,
                )
                .await
        }
    }
}
