//! Error types for extask.

use thiserror::Error;

/// A `Result` alias with [`enum@Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while registering handlers or talking to the task service.
///
/// Failures inside a handler invocation never surface as this type; they are
/// classified into an [`Outcome`](crate::Outcome) instead.
#[derive(Debug, Error)]
pub enum Error {
    /// A handler descriptor was built without a topic.
    #[error("handler registered without a topic")]
    MissingTopic,

    /// The number of parameter bindings does not match the handler's arity.
    #[error(
        "handler for topic '{topic}' takes {expected} arguments but {actual} parameter bindings were declared"
    )]
    ArityMismatch {
        /// The topic the handler is registered for.
        topic: String,
        /// Arity reported by the handler.
        expected: usize,
        /// Number of declared bindings.
        actual: usize,
    },

    /// A parameter binding or result policy is malformed.
    #[error("invalid binding on topic '{topic}': {reason}")]
    InvalidBinding {
        /// The topic the handler is registered for.
        topic: String,
        /// What is wrong with the binding.
        reason: String,
    },

    /// Two error mappings were declared for the same failure category.
    #[error("duplicate error mapping for category '{category}' on topic '{topic}'")]
    DuplicateErrorMapping {
        /// The topic the handler is registered for.
        topic: String,
        /// The repeated failure category.
        category: String,
    },

    /// A topic was registered more than once.
    #[error("duplicate topic registration: {0}")]
    DuplicateTopic(String),

    /// A name expression could not be resolved at registration time.
    #[error("invalid expression '{expression}': {reason}")]
    InvalidExpression {
        /// The raw expression.
        expression: String,
        /// Why it could not be resolved.
        reason: String,
    },

    /// The worker configuration cannot be run.
    #[error("invalid worker configuration: {0}")]
    InvalidConfig(String),

    /// The task service does not know the task.
    #[error("unknown task: {0}")]
    UnknownTask(String),

    /// The calling worker does not hold the lock on the task.
    #[error("task {task_id} is not locked by worker {worker_id}")]
    LockNotHeld {
        /// The task that was reported on.
        task_id: String,
        /// The worker that attempted the report.
        worker_id: String,
    },

    /// Transport-level failure raised by a task service implementation.
    #[error("task service error: {0}")]
    Service(String),
}

impl Error {
    /// Create an invalid binding error with context.
    pub fn invalid_binding(topic: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidBinding {
            topic: topic.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid expression error with context.
    pub fn invalid_expression(expression: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidExpression {
            expression: expression.into(),
            reason: reason.into(),
        }
    }
}
