//! Result publication policy.

/// What to do when a handler returns no value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NullPolicy {
    /// Publish the result variable with a `null` value.
    #[default]
    PublishNull,
    /// Publish nothing.
    Skip,
    /// Treat the missing value as a technical failure.
    Fail,
}

/// How a handler's return value is published as task variables.
///
/// Without a result policy the return value is discarded.
///
/// # Example
///
/// ```
/// use extask::{NullPolicy, ResultPolicy};
///
/// // {"receipt": <value>}
/// let single = ResultPolicy::named("receipt");
///
/// // {"payment_id": .., "payment_status": ..}
/// let flat = ResultPolicy::flattened()
///     .prefix("payment_")
///     .null_policy(NullPolicy::Fail);
/// # let _ = (single, flat);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultPolicy {
    variable_name: String,
    flatten: bool,
    flatten_prefix: String,
    include_null_entries: bool,
    null_policy: NullPolicy,
}

impl ResultPolicy {
    /// Variable name used when none is given.
    pub const DEFAULT_VARIABLE: &'static str = "result";

    /// Publish the return value under `variable_name`.
    pub fn named(variable_name: impl Into<String>) -> Self {
        Self {
            variable_name: variable_name.into(),
            ..Self::default()
        }
    }

    /// Publish each entry of the return value as its own variable.
    ///
    /// The variable name is still used when flattening is not possible.
    pub fn flattened() -> Self {
        Self {
            flatten: true,
            ..Self::default()
        }
    }

    /// Enable or disable flattening.
    pub fn flatten(mut self, flatten: bool) -> Self {
        self.flatten = flatten;
        self
    }

    /// Prefix prepended to every flattened key.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.flatten_prefix = prefix.into();
        self
    }

    /// Publish flattened entries whose value is `null`.
    pub fn include_null_entries(mut self, include: bool) -> Self {
        self.include_null_entries = include;
        self
    }

    /// Set the policy for a missing return value.
    pub fn null_policy(mut self, policy: NullPolicy) -> Self {
        self.null_policy = policy;
        self
    }

    /// Set the variable name.
    pub fn variable(mut self, variable_name: impl Into<String>) -> Self {
        self.variable_name = variable_name.into();
        self
    }

    /// Name of the single result variable.
    pub fn variable_name(&self) -> &str {
        &self.variable_name
    }

    /// Whether entries are published individually.
    pub fn is_flatten(&self) -> bool {
        self.flatten
    }

    /// Prefix for flattened keys.
    pub fn flatten_prefix(&self) -> &str {
        &self.flatten_prefix
    }

    /// Whether `null` entries survive flattening.
    pub fn includes_null_entries(&self) -> bool {
        self.include_null_entries
    }

    /// Policy for a missing return value.
    pub fn on_null(&self) -> NullPolicy {
        self.null_policy
    }

    /// Key under which a flattened entry is published.
    pub(crate) fn flattened_key(&self, key: &str) -> String {
        if self.flatten_prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}{}", self.flatten_prefix, key)
        }
    }

    pub(crate) fn rename(&mut self, name: String) {
        self.variable_name = name;
    }
}

impl Default for ResultPolicy {
    fn default() -> Self {
        Self {
            variable_name: Self::DEFAULT_VARIABLE.to_string(),
            flatten: false,
            flatten_prefix: String::new(),
            include_null_entries: false,
            null_policy: NullPolicy::PublishNull,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy() {
        let policy = ResultPolicy::default();

        assert_eq!(policy.variable_name(), "result");
        assert!(!policy.is_flatten());
        assert_eq!(policy.flatten_prefix(), "");
        assert!(!policy.includes_null_entries());
        assert_eq!(policy.on_null(), NullPolicy::PublishNull);
    }

    #[test]
    fn flatten_toggles_on_named_policy() {
        let policy = ResultPolicy::named("receipt").flatten(true).prefix("r_");
        assert!(policy.is_flatten());
        assert_eq!(policy.variable_name(), "receipt");

        let policy = policy.flatten(false);
        assert!(!policy.is_flatten());
        assert_eq!(policy.flatten_prefix(), "r_");
    }

    #[test]
    fn flattened_key_applies_prefix() {
        let policy = ResultPolicy::flattened().prefix("order_");
        assert_eq!(policy.flattened_key("id"), "order_id");

        let policy = ResultPolicy::flattened();
        assert_eq!(policy.flattened_key("id"), "id");
    }
}
