//! Task executor: argument resolution, invocation and classification.

use std::any::Any;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use super::outcome::{ExecutionError, Outcome};
use crate::convert::{Converter, JsonConverter, TargetShape};
use crate::failure::Failure;
use crate::handler::{
    Args, Argument, BindingSource, ErrorMapping, HandlerDescriptor, NullPolicy, ResultPolicy,
    find_mapping,
};
use crate::task::{ExternalTask, Variables};

/// Runs one task against its handler descriptor.
///
/// # Pipeline
///
/// 1. Resolve each parameter binding against the task variables
/// 2. Invoke the handler on its own tokio task
/// 3. Publish the return value per the result policy
/// 4. Classify any captured failure into a business error or technical failure
///
/// Nothing escapes [`execute`](Self::execute): missing variables, handler
/// failures and panics all become an [`Outcome`].
///
/// # Example
///
/// ```
/// use extask::{
///     Args, ExternalTask, Failure, HandlerDescriptor, Outcome, ParameterBinding, ResultPolicy,
///     TaskExecutor, handler_fn,
/// };
/// use serde_json::json;
///
/// # tokio_test_block(async {
/// let descriptor = HandlerDescriptor::builder(
///     "double",
///     handler_fn(1, |args: Args| async move {
///         let n: i64 = args.require(0)?;
///         Ok::<_, Failure>(Some(json!(n * 2)))
///     }),
/// )
/// .bind(ParameterBinding::variable("n"))
/// .result(ResultPolicy::named("out"))
/// .build()
/// .unwrap();
///
/// let task = ExternalTask::new("t-1", "double").with_variable("n", json!(21));
/// let outcome = TaskExecutor::default().execute(&task, &descriptor).await;
///
/// let Outcome::Success { variables } = outcome else { panic!() };
/// assert_eq!(variables["out"], json!(42));
/// # });
/// # fn tokio_test_block(f: impl std::future::Future<Output = ()>) {
/// #     tokio::runtime::Runtime::new().unwrap().block_on(f)
/// # }
/// ```
#[derive(Clone)]
pub struct TaskExecutor {
    converter: Arc<dyn Converter>,
}

impl Default for TaskExecutor {
    fn default() -> Self {
        Self::with_converter(JsonConverter)
    }
}

impl std::fmt::Debug for TaskExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskExecutor").finish_non_exhaustive()
    }
}

impl TaskExecutor {
    /// Create an executor with a custom structural converter.
    pub fn with_converter(converter: impl Converter) -> Self {
        Self {
            converter: Arc::new(converter),
        }
    }

    /// Execute `task` with `descriptor` and classify the result.
    pub async fn execute(&self, task: &ExternalTask, descriptor: &HandlerDescriptor) -> Outcome {
        debug!(
            task_id = %task.id(),
            topic = %task.topic(),
            retries = ?task.retries(),
            "Executing task"
        );

        let outcome = match self.invoke(task, descriptor).await {
            Ok(variables) => Outcome::Success { variables },
            Err(error) => classify(error, descriptor.error_mappings()),
        };

        match &outcome {
            Outcome::Success { variables } => {
                debug!(
                    task_id = %task.id(),
                    variables = variables.len(),
                    "Task handler succeeded"
                );
            }
            Outcome::BusinessError { code, message } => {
                info!(
                    task_id = %task.id(),
                    code = %code,
                    message = ?message,
                    "Task raised business error"
                );
            }
            Outcome::TechnicalFailure { details, .. } => {
                warn!(
                    task_id = %task.id(),
                    details = %details,
                    "Task failed"
                );
            }
        }

        outcome
    }

    /// Resolve the handler arguments for `task`, in binding order.
    ///
    /// Pure: resolving the same task twice yields identical arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::MissingVariable`] if a required variable is absent.
    pub fn resolve_arguments(
        &self,
        task: &ExternalTask,
        descriptor: &HandlerDescriptor,
    ) -> Result<Args, ExecutionError> {
        let mut arguments = Vec::with_capacity(descriptor.parameters().len());

        for binding in descriptor.parameters() {
            let argument = match binding.source() {
                BindingSource::Task => Argument::Task(task.clone()),
                BindingSource::Variable(name) => {
                    let value = match task.variable(name) {
                        Some(value) => Some(value.clone()),
                        None if binding.is_required() => {
                            return Err(ExecutionError::MissingVariable(name.clone()));
                        }
                        None => binding
                            .fallback_literal()
                            .map(|literal| Value::String(literal.to_string())),
                    };
                    Argument::Value(value.map(|v| self.coerce(name, v, binding.target_shape())))
                }
            };
            arguments.push(argument);
        }

        Ok(Args::new(arguments))
    }

    async fn invoke(
        &self,
        task: &ExternalTask,
        descriptor: &HandlerDescriptor,
    ) -> Result<Variables, ExecutionError> {
        let args = self.resolve_arguments(task, descriptor)?;

        let handler = Arc::clone(descriptor.handler());
        let returned = tokio::spawn(async move { handler.handle(args).await })
            .await
            .map_err(|e| {
                if e.is_panic() {
                    ExecutionError::Panicked(panic_message(e.into_panic()))
                } else {
                    ExecutionError::Panicked("handler task was cancelled".to_string())
                }
            })??;

        self.publish(returned, descriptor.result_policy())
    }

    fn coerce(&self, name: &str, value: Value, shape: TargetShape) -> Value {
        if shape.is_satisfied_by(&value) {
            return value;
        }

        match self.converter.convert(&value, shape) {
            Ok(converted) => converted,
            Err(e) => {
                warn!(
                    variable = %name,
                    shape = %shape,
                    error = %e,
                    "Could not convert variable, passing raw value"
                );
                value
            }
        }
    }

    fn publish(
        &self,
        returned: Option<Value>,
        policy: Option<&ResultPolicy>,
    ) -> Result<Variables, ExecutionError> {
        let mut variables = Variables::new();

        let Some(policy) = policy else {
            return Ok(variables);
        };

        let value = match returned {
            Some(Value::Null) | None => {
                return match policy.on_null() {
                    NullPolicy::PublishNull => {
                        variables.insert(policy.variable_name().to_string(), Value::Null);
                        Ok(variables)
                    }
                    NullPolicy::Skip => Ok(variables),
                    NullPolicy::Fail => Err(ExecutionError::NullResult),
                };
            }
            Some(value) => value,
        };

        if !policy.is_flatten() {
            variables.insert(policy.variable_name().to_string(), value);
            return Ok(variables);
        }

        match self.converter.to_entries(&value) {
            Ok(entries) => {
                for (key, entry) in entries {
                    if entry.is_null() && !policy.includes_null_entries() {
                        continue;
                    }
                    variables.insert(policy.flattened_key(&key), entry);
                }
            }
            Err(e) => {
                warn!(
                    variable = %policy.variable_name(),
                    error = %e,
                    "Could not flatten result, publishing as single variable"
                );
                variables.insert(policy.variable_name().to_string(), value);
            }
        }

        Ok(variables)
    }
}

/// Classify a captured execution error.
fn classify(error: ExecutionError, mappings: &[ErrorMapping]) -> Outcome {
    match error {
        ExecutionError::Handler(failure) => classify_failure(failure.into_underlying(), mappings),
        other => {
            let message = other.to_string();
            let details = format!("{}: {}", other.category(), message);
            Outcome::technical(message, details)
        }
    }
}

fn classify_failure(failure: Failure, mappings: &[ErrorMapping]) -> Outcome {
    if let Some(mapping) = find_mapping(mappings, &failure) {
        return Outcome::BusinessError {
            code: mapping.code().to_string(),
            message: mapping.message_for(&failure),
        };
    }

    let category = failure.category().name();
    let message = failure.message().unwrap_or(category).to_string();
    let details = format!("{category}: {message}");
    Outcome::technical(message, details)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
