//! Task coordination service abstraction.
//!
//! The worker talks to the coordination service through two traits:
//!
//! - [`TaskSource`]: fetches and locks tasks for a worker
//! - [`TaskService`]: reports the result of a locked task
//!
//! [`InMemoryTaskService`] implements both for tests and embedding.
//!
//! # Locking Protocol
//!
//! 1. `fetch_and_lock` locks each returned task for the requested duration
//! 2. Exactly one of `complete`, `report_business_error` or `report_failure`
//!    is called for every locked task
//! 3. If a worker crashes, the lock expires and the task is fetched again

mod memory;

use std::future::Future;
use std::time::Duration;

pub use memory::{InMemoryTaskService, Incident, Reported, TaskState};

use crate::error::Result;
use crate::task::{ExternalTask, Variables};

/// Reports the result of a locked task.
pub trait TaskService: Send + Sync + Clone + 'static {
    /// Complete the task, publishing `variables`.
    fn complete(
        &self,
        task: &ExternalTask,
        variables: Variables,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Report a business error. The task is not retried.
    fn report_business_error(
        &self,
        task: &ExternalTask,
        code: &str,
        message: Option<&str>,
        variables: Variables,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Report a technical failure.
    ///
    /// `retries` is the remaining retry budget. When it is zero the service
    /// stops retrying and raises an incident; otherwise the task becomes
    /// available again after `retry_timeout`.
    fn report_failure(
        &self,
        task: &ExternalTask,
        message: &str,
        details: &str,
        retries: u32,
        retry_timeout: Duration,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Fetches and locks tasks for a worker.
pub trait TaskSource: Send + Sync + Clone + 'static {
    /// Fetch up to `request.max_tasks` available tasks on the requested
    /// topics and lock them for `request.worker_id`.
    fn fetch_and_lock(
        &self,
        request: &FetchRequest,
    ) -> impl Future<Output = Result<Vec<ExternalTask>>> + Send;
}

/// Parameters of a fetch-and-lock call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Worker that will hold the locks.
    pub worker_id: String,
    /// Maximum number of tasks to return.
    pub max_tasks: usize,
    /// Return higher priority tasks first.
    pub use_priority: bool,
    /// Topics to fetch, each with its own lock duration.
    pub topics: Vec<TopicRequest>,
}

/// One topic subscription in a [`FetchRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicRequest {
    /// Topic name.
    pub topic: String,
    /// How long fetched tasks stay locked.
    pub lock_duration: Duration,
}

impl FetchRequest {
    /// Create a request with no topics.
    pub fn new(worker_id: impl Into<String>, max_tasks: usize) -> Self {
        Self {
            worker_id: worker_id.into(),
            max_tasks,
            use_priority: true,
            topics: Vec::new(),
        }
    }

    /// Subscribe to `topic` with the given lock duration.
    pub fn topic(mut self, topic: impl Into<String>, lock_duration: Duration) -> Self {
        self.topics.push(TopicRequest {
            topic: topic.into(),
            lock_duration,
        });
        self
    }

    /// Enable or disable priority ordering.
    pub fn use_priority(mut self, use_priority: bool) -> Self {
        self.use_priority = use_priority;
        self
    }

    /// Lock duration for `topic`, if requested.
    pub fn lock_duration_for(&self, topic: &str) -> Option<Duration> {
        self.topics
            .iter()
            .find(|request| request.topic == topic)
            .map(|request| request.lock_duration)
    }
}
