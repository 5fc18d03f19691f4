//! Execution outcomes and execution-time errors.

use thiserror::Error;

use crate::failure::Failure;
use crate::task::Variables;

/// Result of executing one task.
///
/// Every execution produces exactly one outcome, and every outcome maps to
/// exactly one task service call.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The handler returned normally.
    Success {
        /// Output variables to complete the task with.
        variables: Variables,
    },

    /// The handler raised a failure matched by an error mapping.
    BusinessError {
        /// Business error code.
        code: String,
        /// Override message or the failure's own message.
        message: Option<String>,
    },

    /// Any other failure; subject to retries.
    TechnicalFailure {
        /// Short failure message.
        message: String,
        /// `<category>: <message>` detail line.
        details: String,
    },
}

impl Outcome {
    /// Short name of the outcome variant, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Outcome::Success { .. } => "success",
            Outcome::BusinessError { .. } => "business_error",
            Outcome::TechnicalFailure { .. } => "technical_failure",
        }
    }

    /// Returns `true` for [`Outcome::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub(crate) fn technical(message: impl Into<String>, details: impl Into<String>) -> Self {
        Outcome::TechnicalFailure {
            message: message.into(),
            details: details.into(),
        }
    }
}

/// Conditions captured while executing a task.
///
/// These never escape [`TaskExecutor::execute`](super::TaskExecutor::execute).
/// Only [`ExecutionError::Handler`] consults error mappings; every other
/// variant is always a technical failure.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// A required variable was absent.
    #[error("required variable '{0}' not found")]
    MissingVariable(String),

    /// The handler returned no value under [`NullPolicy::Fail`](crate::NullPolicy::Fail).
    #[error("handler returned no value")]
    NullResult,

    /// The handler panicked.
    #[error("handler panicked: {0}")]
    Panicked(String),

    /// The handler returned a failure.
    #[error(transparent)]
    Handler(Failure),
}

impl ExecutionError {
    /// Category name reported for conditions that bypass error mappings.
    pub fn category(&self) -> &str {
        match self {
            ExecutionError::MissingVariable(_) => "MissingVariable",
            ExecutionError::NullResult => "NullResult",
            ExecutionError::Panicked(_) => "Panic",
            ExecutionError::Handler(failure) => failure.category().name(),
        }
    }
}

impl From<Failure> for ExecutionError {
    fn from(failure: Failure) -> Self {
        ExecutionError::Handler(failure)
    }
}
