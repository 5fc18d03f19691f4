//! Registration-time name resolution.

use std::collections::HashMap;

use crate::error::{Error, Result};

/// Resolves topic and variable names when handlers are registered.
///
/// Applied once per descriptor by [`WorkerBuilder::build`](super::WorkerBuilder::build),
/// never during execution. Closures of type `Fn(&str) -> Result<String>`
/// implement this trait.
pub trait NameResolver: Send + Sync + 'static {
    /// Resolve a raw name.
    fn resolve(&self, name: &str) -> Result<String>;
}

impl<F> NameResolver for F
where
    F: Fn(&str) -> Result<String> + Send + Sync + 'static,
{
    fn resolve(&self, name: &str) -> Result<String> {
        self(name)
    }
}

/// Substitutes `#{key}` placeholders from a property map.
///
/// Names without placeholders pass through unchanged.
///
/// # Example
///
/// ```
/// use extask::{NameResolver, PropertyResolver};
///
/// let resolver = PropertyResolver::new()
///     .property("tenant", "acme")
///     .property("env", "prod");
///
/// assert_eq!(resolver.resolve("#{tenant}-invoices-#{env}").unwrap(), "acme-invoices-prod");
/// assert_eq!(resolver.resolve("plain").unwrap(), "plain");
/// assert!(resolver.resolve("#{missing}").is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct PropertyResolver {
    properties: HashMap<String, String>,
}

impl PropertyResolver {
    /// Create a resolver with no properties.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a property.
    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

impl<K, V> FromIterator<(K, V)> for PropertyResolver
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            properties: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

impl NameResolver for PropertyResolver {
    fn resolve(&self, name: &str) -> Result<String> {
        let mut resolved = String::with_capacity(name.len());
        let mut rest = name;

        while let Some(start) = rest.find("#{") {
            resolved.push_str(&rest[..start]);
            let after = &rest[start + 2..];

            let Some(end) = after.find('}') else {
                return Err(Error::invalid_expression(name, "unterminated placeholder"));
            };

            let key = after[..end].trim();
            let value = self.properties.get(key).ok_or_else(|| {
                Error::invalid_expression(name, format!("unknown property '{key}'"))
            })?;
            resolved.push_str(value);
            rest = &after[end + 1..];
        }

        resolved.push_str(rest);
        Ok(resolved)
    }
}
