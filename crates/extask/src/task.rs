//! External task model.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

/// Named task variables.
///
/// Backed by an ordered map so output construction is deterministic.
pub type Variables = serde_json::Map<String, Value>;

/// A unit of work fetched from the task coordination service.
///
/// Tasks are routed to handlers by [`topic`](Self::topic). The
/// [`retries`](Self::retries) field is `None` until the first technical
/// failure has been reported; after that it holds the remaining retry budget.
///
/// # Example
///
/// ```
/// use extask::ExternalTask;
/// use serde_json::json;
///
/// let task = ExternalTask::new("task-1", "charge-card")
///     .with_variable("amount", json!(42))
///     .with_business_key("order-7");
///
/// assert_eq!(task.topic(), "charge-card");
/// assert_eq!(task.variable("amount"), Some(&json!(42)));
/// assert!(task.retries().is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalTask {
    id: String,
    topic: String,
    variables: Variables,
    retries: Option<u32>,
    business_key: Option<String>,
    priority: i64,
    worker_id: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    lock_expiration_time: Option<OffsetDateTime>,
    error_message: Option<String>,
    error_details: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
}

impl ExternalTask {
    /// Create a task with no variables and an unset retry count.
    pub fn new(id: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            topic: topic.into(),
            variables: Variables::new(),
            retries: None,
            business_key: None,
            priority: 0,
            worker_id: None,
            lock_expiration_time: None,
            error_message: None,
            error_details: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    /// Set a single variable.
    pub fn with_variable(mut self, name: impl Into<String>, value: Value) -> Self {
        self.variables.insert(name.into(), value);
        self
    }

    /// Replace the variable set.
    pub fn with_variables(mut self, variables: Variables) -> Self {
        self.variables = variables;
        self
    }

    /// Set the remaining retry count.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    /// Set the business key of the owning process instance.
    pub fn with_business_key(mut self, business_key: impl Into<String>) -> Self {
        self.business_key = Some(business_key.into());
        self
    }

    /// Set the fetch priority. Higher values are fetched first.
    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    /// The task identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The topic used to route the task to a handler.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// All variables visible to the task.
    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    /// Look up a variable. A variable holding `null` is reported as absent.
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name).filter(|value| !value.is_null())
    }

    /// Remaining retries, or `None` before the first failure.
    pub fn retries(&self) -> Option<u32> {
        self.retries
    }

    /// Business key of the owning process instance.
    pub fn business_key(&self) -> Option<&str> {
        self.business_key.as_deref()
    }

    /// Fetch priority.
    pub fn priority(&self) -> i64 {
        self.priority
    }

    /// The worker currently holding the lock.
    pub fn worker_id(&self) -> Option<&str> {
        self.worker_id.as_deref()
    }

    /// When the current lock expires.
    pub fn lock_expiration_time(&self) -> Option<OffsetDateTime> {
        self.lock_expiration_time
    }

    /// Message from the most recent failure report.
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Details from the most recent failure report.
    pub fn error_details(&self) -> Option<&str> {
        self.error_details.as_deref()
    }

    /// When the task was created.
    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    pub(crate) fn lock(&mut self, worker_id: &str, until: OffsetDateTime) {
        self.worker_id = Some(worker_id.to_string());
        self.lock_expiration_time = Some(until);
    }

    pub(crate) fn unlock(&mut self) {
        self.worker_id = None;
        self.lock_expiration_time = None;
    }

    pub(crate) fn record_failure(&mut self, retries: u32, message: &str, details: &str) {
        self.retries = Some(retries);
        self.error_message = Some(message.to_string());
        self.error_details = Some(details.to_string());
    }

    pub(crate) fn merge_variables(&mut self, variables: &Variables) {
        for (name, value) in variables {
            self.variables.insert(name.clone(), value.clone());
        }
    }
}

impl std::fmt::Display for ExternalTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.topic, self.id)
    }
}
