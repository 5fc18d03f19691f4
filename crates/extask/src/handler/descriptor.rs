//! Handler descriptors: the registration-time metadata for one topic.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::binding::ParameterBinding;
use super::mapping::ErrorMapping;
use super::result::ResultPolicy;
use super::task_handler::TaskHandler;
use crate::error::{Error, Result};
use crate::runtime::NameResolver;

/// Immutable binding of a topic to a handler.
///
/// A descriptor carries everything the executor needs to run a task: the
/// handler, where each argument comes from, how the return value is
/// published, and which failure categories become business errors.
///
/// Cloning is cheap; the handler is shared.
///
/// # Example
///
/// ```
/// use extask::{
///     Args, ErrorMapping, Failure, HandlerDescriptor, ParameterBinding, ResultPolicy,
///     TargetShape, handler_fn,
/// };
/// use serde_json::json;
///
/// let descriptor = HandlerDescriptor::builder(
///     "charge-card",
///     handler_fn(2, |args: Args| async move {
///         let amount: f64 = args.require(0)?;
///         Ok::<_, Failure>(Some(json!({ "charged": amount })))
///     }),
/// )
/// .bind(ParameterBinding::variable("amount").required().shape(TargetShape::Float))
/// .bind(ParameterBinding::task())
/// .result(ResultPolicy::named("receipt"))
/// .map_error(ErrorMapping::new("CardDeclined", "PAYMENT_REJECTED"))
/// .build()
/// .unwrap();
///
/// assert_eq!(descriptor.topic(), "charge-card");
/// assert_eq!(descriptor.parameters().len(), 2);
/// ```
#[derive(Clone)]
pub struct HandlerDescriptor {
    topic: String,
    handler: Arc<dyn TaskHandler>,
    parameters: Vec<ParameterBinding>,
    result: Option<ResultPolicy>,
    error_mappings: Vec<ErrorMapping>,
    lock_duration: Option<Duration>,
}

impl HandlerDescriptor {
    /// Start building a descriptor for `topic`.
    pub fn builder(topic: impl Into<String>, handler: impl TaskHandler) -> HandlerDescriptorBuilder {
        HandlerDescriptorBuilder::new(topic.into(), Arc::new(handler))
    }

    /// Start building a descriptor from an already shared handler.
    pub fn builder_shared(
        topic: impl Into<String>,
        handler: Arc<dyn TaskHandler>,
    ) -> HandlerDescriptorBuilder {
        HandlerDescriptorBuilder::new(topic.into(), handler)
    }

    /// The topic this descriptor handles.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// The bound handler.
    pub fn handler(&self) -> &Arc<dyn TaskHandler> {
        &self.handler
    }

    /// Parameter bindings in argument order.
    pub fn parameters(&self) -> &[ParameterBinding] {
        &self.parameters
    }

    /// The result policy; `None` discards the return value.
    pub fn result_policy(&self) -> Option<&ResultPolicy> {
        self.result.as_ref()
    }

    /// Error mappings in declaration order.
    pub fn error_mappings(&self) -> &[ErrorMapping] {
        &self.error_mappings
    }

    /// Lock duration override for this topic.
    pub fn lock_duration(&self) -> Option<Duration> {
        self.lock_duration
    }

    /// Resolve the topic, variable names and result name through `resolver`.
    ///
    /// Called once at registration. The resolved descriptor is validated again.
    pub(crate) fn resolve_names(mut self, resolver: &dyn NameResolver) -> Result<Self> {
        self.topic = resolver.resolve(&self.topic)?;

        for binding in &mut self.parameters {
            if let Some(name) = binding.variable_name() {
                let resolved = resolver.resolve(name)?;
                binding.rename(resolved);
            }
        }

        if let Some(policy) = &mut self.result {
            let resolved = resolver.resolve(policy.variable_name())?;
            policy.rename(resolved);
        }

        validate_names(&self)?;
        Ok(self)
    }
}

impl fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("topic", &self.topic)
            .field("arity", &self.handler.arity())
            .field("parameters", &self.parameters)
            .field("result", &self.result)
            .field("error_mappings", &self.error_mappings)
            .field("lock_duration", &self.lock_duration)
            .finish()
    }
}

/// Builder for [`HandlerDescriptor`].
///
/// Validation happens in [`build`](Self::build).
pub struct HandlerDescriptorBuilder {
    topic: String,
    handler: Arc<dyn TaskHandler>,
    parameters: Vec<ParameterBinding>,
    result: Option<ResultPolicy>,
    error_mappings: Vec<ErrorMapping>,
    lock_duration: Option<Duration>,
}

impl HandlerDescriptorBuilder {
    fn new(topic: String, handler: Arc<dyn TaskHandler>) -> Self {
        Self {
            topic,
            handler,
            parameters: Vec::new(),
            result: None,
            error_mappings: Vec::new(),
            lock_duration: None,
        }
    }

    /// Append the binding for the next handler argument.
    pub fn bind(mut self, binding: ParameterBinding) -> Self {
        self.parameters.push(binding);
        self
    }

    /// Publish the return value according to `policy`.
    pub fn result(mut self, policy: ResultPolicy) -> Self {
        self.result = Some(policy);
        self
    }

    /// Add an error mapping. Mappings are consulted in declaration order.
    pub fn map_error(mut self, mapping: ErrorMapping) -> Self {
        self.error_mappings.push(mapping);
        self
    }

    /// Override the worker's lock duration for this topic.
    pub fn lock_duration(mut self, duration: Duration) -> Self {
        self.lock_duration = Some(duration);
        self
    }

    /// Validate and build the descriptor.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingTopic`] if the topic is blank
    /// - [`Error::ArityMismatch`] if the binding count differs from the handler's arity
    /// - [`Error::InvalidBinding`] if a variable or result name is blank
    /// - [`Error::DuplicateErrorMapping`] if two mappings share a category
    pub fn build(self) -> Result<HandlerDescriptor> {
        let descriptor = HandlerDescriptor {
            topic: self.topic,
            handler: self.handler,
            parameters: self.parameters,
            result: self.result,
            error_mappings: self.error_mappings,
            lock_duration: self.lock_duration,
        };

        validate_names(&descriptor)?;

        let expected = descriptor.handler.arity();
        if descriptor.parameters.len() != expected {
            return Err(Error::ArityMismatch {
                topic: descriptor.topic,
                expected,
                actual: descriptor.parameters.len(),
            });
        }

        let mut categories = HashSet::new();
        for mapping in &descriptor.error_mappings {
            if mapping.category().trim().is_empty() {
                return Err(Error::invalid_binding(
                    &descriptor.topic,
                    "error mapping with blank category",
                ));
            }
            if !categories.insert(mapping.category()) {
                return Err(Error::DuplicateErrorMapping {
                    topic: descriptor.topic.clone(),
                    category: mapping.category().to_string(),
                });
            }
        }

        Ok(descriptor)
    }
}

fn validate_names(descriptor: &HandlerDescriptor) -> Result<()> {
    if descriptor.topic.trim().is_empty() {
        return Err(Error::MissingTopic);
    }

    for (position, binding) in descriptor.parameters.iter().enumerate() {
        if binding.variable_name().is_some_and(|name| name.trim().is_empty()) {
            return Err(Error::invalid_binding(
                &descriptor.topic,
                format!("parameter {position} has a blank variable name"),
            ));
        }
    }

    if let Some(policy) = &descriptor.result
        && policy.variable_name().trim().is_empty()
    {
        return Err(Error::invalid_binding(
            &descriptor.topic,
            "result variable name is blank",
        ));
    }

    Ok(())
}
