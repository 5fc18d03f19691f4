//! Parameter bindings: where each handler argument comes from.

use crate::convert::TargetShape;

/// Source of a bound argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingSource {
    /// Bind the task itself; no lookup and no conversion.
    Task,
    /// Look up a task variable by name.
    Variable(String),
}

/// Declares how one handler argument is resolved from a task.
///
/// Bindings are created at registration time and never change afterwards.
///
/// # Example
///
/// ```
/// use extask::{ParameterBinding, TargetShape};
///
/// let amount = ParameterBinding::variable("amount")
///     .required()
///     .shape(TargetShape::Float);
///
/// let currency = ParameterBinding::variable("currency")
///     .fallback("EUR")
///     .shape(TargetShape::String);
///
/// let task = ParameterBinding::task();
/// # let _ = (amount, currency, task);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterBinding {
    source: BindingSource,
    required: bool,
    fallback: Option<String>,
    shape: TargetShape,
}

impl ParameterBinding {
    /// Bind the task handle itself.
    pub fn task() -> Self {
        Self {
            source: BindingSource::Task,
            required: false,
            fallback: None,
            shape: TargetShape::Any,
        }
    }

    /// Bind a task variable by name.
    pub fn variable(name: impl Into<String>) -> Self {
        Self {
            source: BindingSource::Variable(name.into()),
            required: false,
            fallback: None,
            shape: TargetShape::Any,
        }
    }

    /// Fail the invocation when the variable is absent.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Literal used when the variable is absent and not required.
    ///
    /// An empty literal is treated as no fallback.
    pub fn fallback(mut self, literal: impl Into<String>) -> Self {
        self.fallback = Some(literal.into());
        self
    }

    /// Shape the resolved value is coerced into.
    pub fn shape(mut self, shape: TargetShape) -> Self {
        self.shape = shape;
        self
    }

    /// Where the argument comes from.
    pub fn source(&self) -> &BindingSource {
        &self.source
    }

    /// The variable name, or `None` for the task binding.
    pub fn variable_name(&self) -> Option<&str> {
        match &self.source {
            BindingSource::Task => None,
            BindingSource::Variable(name) => Some(name),
        }
    }

    /// Whether an absent variable is fatal.
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// The fallback literal, if set and non-empty.
    pub fn fallback_literal(&self) -> Option<&str> {
        self.fallback.as_deref().filter(|literal| !literal.is_empty())
    }

    /// The target shape.
    pub fn target_shape(&self) -> TargetShape {
        self.shape
    }

    pub(crate) fn rename(&mut self, name: String) {
        if let BindingSource::Variable(current) = &mut self.source {
            *current = name;
        }
    }
}
