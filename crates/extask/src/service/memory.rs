//! In-memory task coordination service.

use std::cmp::Reverse;
use std::sync::Arc;
use std::time::Duration;

use time::{OffsetDateTime, PrimitiveDateTime};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{FetchRequest, TaskService, TaskSource};
use crate::error::{Error, Result};
use crate::task::{ExternalTask, Variables};

/// A call received by the [`InMemoryTaskService`].
#[derive(Debug, Clone, PartialEq)]
pub enum Reported {
    /// `complete` was called.
    Completed {
        /// The task.
        task_id: String,
        /// Published variables.
        variables: Variables,
    },
    /// `report_business_error` was called.
    BusinessError {
        /// The task.
        task_id: String,
        /// Business error code.
        code: String,
        /// Error message.
        message: Option<String>,
        /// Published variables.
        variables: Variables,
    },
    /// `report_failure` was called.
    Failure {
        /// The task.
        task_id: String,
        /// Failure message.
        message: String,
        /// Failure details.
        details: String,
        /// Remaining retries.
        retries: u32,
        /// Delay before the next attempt.
        retry_timeout: Duration,
    },
}

impl Reported {
    /// The task the call was about.
    pub fn task_id(&self) -> &str {
        match self {
            Reported::Completed { task_id, .. }
            | Reported::BusinessError { task_id, .. }
            | Reported::Failure { task_id, .. } => task_id,
        }
    }
}

/// A task whose retries ran out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incident {
    /// The failed task.
    pub task_id: String,
    /// Its topic.
    pub topic: String,
    /// Last failure message.
    pub message: String,
    /// Last failure details.
    pub details: String,
}

/// Lifecycle state of a task held by the [`InMemoryTaskService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Waiting to be fetched, locked, or waiting for a retry.
    Open,
    /// Completed successfully.
    Completed,
    /// Ended with a business error.
    BusinessError,
    /// Retries exhausted; never fetched again.
    Incident,
}

struct Entry {
    task: ExternalTask,
    state: TaskState,
    available_at: Option<OffsetDateTime>,
}

impl Entry {
    fn is_fetchable(&self, now: OffsetDateTime) -> bool {
        if self.state != TaskState::Open {
            return false;
        }
        if self.available_at.is_some_and(|at| at > now) {
            return false;
        }
        match self.task.lock_expiration_time() {
            Some(until) => until <= now,
            None => true,
        }
    }
}

#[derive(Default)]
struct State {
    entries: Vec<Entry>,
    reported: Vec<Reported>,
    incidents: Vec<Incident>,
}

impl State {
    fn entry(&self, task_id: &str) -> Option<&Entry> {
        self.entries.iter().find(|entry| entry.task.id() == task_id)
    }

    /// The entry for `task`, if the reporting worker holds its lock.
    fn locked_entry(&mut self, task: &ExternalTask) -> Result<&mut Entry> {
        let entry = self
            .entries
            .iter_mut()
            .find(|entry| entry.task.id() == task.id())
            .ok_or_else(|| Error::UnknownTask(task.id().to_string()))?;

        let holder = entry.task.worker_id();
        if entry.state != TaskState::Open || holder.is_none() || holder != task.worker_id() {
            return Err(Error::LockNotHeld {
                task_id: task.id().to_string(),
                worker_id: task.worker_id().unwrap_or("<none>").to_string(),
            });
        }

        Ok(entry)
    }
}

/// Task coordination service held in process memory.
///
/// Implements both [`TaskSource`] and [`TaskService`]. Clones share state.
///
/// - Tasks are fetched in priority order (highest first) when requested,
///   otherwise in creation order
/// - Reports are only accepted from the worker holding the task's lock
/// - Completion merges the output variables into the task's variables;
///   an output variable overwrites an existing variable of the same name
/// - A failure reported with zero retries raises an [`Incident`]
///
/// # Example
///
/// ```
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// use extask::{FetchRequest, InMemoryTaskService, TaskSource};
/// use serde_json::json;
/// use std::time::Duration;
///
/// let service = InMemoryTaskService::new();
/// let id = service.push("send-invoice", [("order", json!(7))]).await;
///
/// let request = FetchRequest::new("worker-1", 10).topic("send-invoice", Duration::from_secs(30));
/// let tasks = service.fetch_and_lock(&request).await.unwrap();
///
/// assert_eq!(tasks.len(), 1);
/// assert_eq!(tasks[0].id(), id);
/// assert_eq!(tasks[0].worker_id(), Some("worker-1"));
/// # });
/// ```
#[derive(Clone, Default)]
pub struct InMemoryTaskService {
    state: Arc<Mutex<State>>,
}

impl InMemoryTaskService {
    /// Create an empty service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task on `topic` with the given variables. Returns its id.
    pub async fn push<I, K>(&self, topic: impl Into<String>, variables: I) -> String
    where
        I: IntoIterator<Item = (K, serde_json::Value)>,
        K: Into<String>,
    {
        let variables = variables
            .into_iter()
            .map(|(name, value)| (name.into(), value))
            .collect();
        let task = ExternalTask::new(Uuid::now_v7().to_string(), topic).with_variables(variables);
        self.push_task(task).await
    }

    /// Add a prepared task. Returns its id.
    pub async fn push_task(&self, task: ExternalTask) -> String {
        let id = task.id().to_string();
        self.state.lock().await.entries.push(Entry {
            task,
            state: TaskState::Open,
            available_at: None,
        });
        id
    }

    /// Snapshot of a task, including its current variables.
    pub async fn task(&self, task_id: &str) -> Option<ExternalTask> {
        self.state
            .lock()
            .await
            .entry(task_id)
            .map(|entry| entry.task.clone())
    }

    /// Lifecycle state of a task.
    pub async fn state_of(&self, task_id: &str) -> Option<TaskState> {
        self.state.lock().await.entry(task_id).map(|entry| entry.state)
    }

    /// Every report received, in order.
    pub async fn reported(&self) -> Vec<Reported> {
        self.state.lock().await.reported.clone()
    }

    /// Incidents raised so far.
    pub async fn incidents(&self) -> Vec<Incident> {
        self.state.lock().await.incidents.clone()
    }

    /// Distinct topics of open tasks, in creation order.
    pub async fn topics(&self) -> Vec<String> {
        let state = self.state.lock().await;
        let mut topics: Vec<String> = Vec::new();
        for entry in state.entries.iter().filter(|e| e.state == TaskState::Open) {
            if !topics.iter().any(|t| t == entry.task.topic()) {
                topics.push(entry.task.topic().to_string());
            }
        }
        topics
    }

    /// Number of tasks still open.
    pub async fn open_count(&self) -> usize {
        self.state
            .lock()
            .await
            .entries
            .iter()
            .filter(|entry| entry.state == TaskState::Open)
            .count()
    }
}

impl TaskSource for InMemoryTaskService {
    async fn fetch_and_lock(&self, request: &FetchRequest) -> Result<Vec<ExternalTask>> {
        let now = OffsetDateTime::now_utc();
        let mut state = self.state.lock().await;

        let mut candidates: Vec<usize> = state
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| {
                entry.is_fetchable(now) && request.lock_duration_for(entry.task.topic()).is_some()
            })
            .map(|(index, _)| index)
            .collect();

        if request.use_priority {
            // Stable sort keeps creation order within a priority.
            candidates.sort_by_key(|&index| Reverse(state.entries[index].task.priority()));
        }
        candidates.truncate(request.max_tasks);

        let mut fetched = Vec::with_capacity(candidates.len());
        for index in candidates {
            let entry = &mut state.entries[index];
            let lock_duration = request
                .lock_duration_for(entry.task.topic())
                .unwrap_or_default();
            entry.task.lock(&request.worker_id, after(now, lock_duration));
            entry.available_at = None;
            fetched.push(entry.task.clone());
        }

        if !fetched.is_empty() {
            debug!(
                worker_id = %request.worker_id,
                count = fetched.len(),
                "Locked tasks"
            );
        }

        Ok(fetched)
    }
}

impl TaskService for InMemoryTaskService {
    async fn complete(&self, task: &ExternalTask, variables: Variables) -> Result<()> {
        let mut state = self.state.lock().await;
        let entry = state.locked_entry(task)?;

        entry.task.merge_variables(&variables);
        entry.task.unlock();
        entry.state = TaskState::Completed;

        state.reported.push(Reported::Completed {
            task_id: task.id().to_string(),
            variables,
        });
        Ok(())
    }

    async fn report_business_error(
        &self,
        task: &ExternalTask,
        code: &str,
        message: Option<&str>,
        variables: Variables,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        let entry = state.locked_entry(task)?;

        entry.task.merge_variables(&variables);
        entry.task.unlock();
        entry.state = TaskState::BusinessError;

        state.reported.push(Reported::BusinessError {
            task_id: task.id().to_string(),
            code: code.to_string(),
            message: message.map(str::to_string),
            variables,
        });
        Ok(())
    }

    async fn report_failure(
        &self,
        task: &ExternalTask,
        message: &str,
        details: &str,
        retries: u32,
        retry_timeout: Duration,
    ) -> Result<()> {
        let now = OffsetDateTime::now_utc();
        let mut state = self.state.lock().await;
        let entry = state.locked_entry(task)?;

        entry.task.record_failure(retries, message, details);
        entry.task.unlock();

        let incident = if retries == 0 {
            entry.state = TaskState::Incident;
            Some(Incident {
                task_id: task.id().to_string(),
                topic: entry.task.topic().to_string(),
                message: message.to_string(),
                details: details.to_string(),
            })
        } else {
            entry.available_at = Some(after(now, retry_timeout));
            None
        };

        state.reported.push(Reported::Failure {
            task_id: task.id().to_string(),
            message: message.to_string(),
            details: details.to_string(),
            retries,
            retry_timeout,
        });

        if let Some(incident) = incident {
            warn!(
                task_id = %incident.task_id,
                topic = %incident.topic,
                message = %incident.message,
                "Retries exhausted, raising incident"
            );
            state.incidents.push(incident);
        }
        Ok(())
    }
}

/// `now + delay`, saturating at the latest representable instant.
fn after(now: OffsetDateTime, delay: Duration) -> OffsetDateTime {
    time::Duration::try_from(delay)
        .ok()
        .and_then(|delay| now.checked_add(delay))
        .unwrap_or_else(|| PrimitiveDateTime::MAX.assume_utc())
}
