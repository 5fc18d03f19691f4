//! Handler registry, worker builder and worker runtime.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::config::WorkerConfig;
use super::resolver::NameResolver;
use super::task_worker::TaskWorker;
use crate::error::{Error, Result};
use crate::execution::{TaskExecutor, dispatch};
use crate::handler::HandlerDescriptor;
use crate::service::{FetchRequest, TaskService, TaskSource};
use crate::task::ExternalTask;

/// Category reported for tasks whose topic has no registered handler.
const UNKNOWN_TOPIC: &str = "UnknownTopic";

/// Registry mapping topics to their handler descriptors.
///
/// Built once by [`WorkerBuilder`] and read-only afterwards.
#[derive(Debug, Default, Clone)]
pub struct HandlerRegistry {
    descriptors: BTreeMap<String, HandlerDescriptor>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a descriptor under its topic.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateTopic`] if the topic is already registered.
    pub fn insert(&mut self, descriptor: HandlerDescriptor) -> Result<()> {
        if self.descriptors.contains_key(descriptor.topic()) {
            return Err(Error::DuplicateTopic(descriptor.topic().to_string()));
        }
        self.descriptors
            .insert(descriptor.topic().to_string(), descriptor);
        Ok(())
    }

    /// Look up the descriptor for `topic`.
    pub fn get(&self, topic: &str) -> Option<&HandlerDescriptor> {
        self.descriptors.get(topic)
    }

    /// Registered topics, in sorted order.
    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.descriptors.keys().map(String::as_str)
    }

    /// Returns the number of registered topics.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    fn descriptors(&self) -> impl Iterator<Item = &HandlerDescriptor> {
        self.descriptors.values()
    }
}

/// Builder for constructing a [`WorkerRuntime`].
///
/// Use this to register handlers and configure the runtime before starting.
/// Name resolution and duplicate topic checks are deferred until
/// [`build`](Self::build).
///
/// # Example
///
/// ```ignore
/// let runtime = WorkerRuntime::builder(service)
///     .resolver(PropertyResolver::new().property("tenant", "acme"))
///     .register(charge_card)
///     .register(send_invoice)
///     .config(WorkerConfig {
///         poll_interval: Duration::from_millis(50),
///         ..Default::default()
///     })
///     .build()?;
/// ```
pub struct WorkerBuilder<S>
where
    S: TaskSource + TaskService,
{
    service: S,
    descriptors: Vec<HandlerDescriptor>,
    resolver: Option<Box<dyn NameResolver>>,
    executor: TaskExecutor,
    config: WorkerConfig,
}

impl<S> WorkerBuilder<S>
where
    S: TaskSource + TaskService,
{
    fn new(service: S) -> Self {
        Self {
            service,
            descriptors: Vec::new(),
            resolver: None,
            executor: TaskExecutor::default(),
            config: WorkerConfig::default(),
        }
    }

    /// Register a handler descriptor.
    ///
    /// Each topic can only be registered once.
    pub fn register(mut self, descriptor: HandlerDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    /// Resolve topic and variable names through `resolver` at build time.
    pub fn resolver(mut self, resolver: impl NameResolver) -> Self {
        self.resolver = Some(Box::new(resolver));
        self
    }

    /// Use a custom executor, e.g. one with a different converter.
    pub fn executor(mut self, executor: TaskExecutor) -> Self {
        self.executor = executor;
        self
    }

    /// Set the worker configuration.
    ///
    /// If not called, uses [`WorkerConfig::default()`].
    pub fn config(mut self, config: WorkerConfig) -> Self {
        self.config = config;
        self
    }

    /// Resolve names, build the registry and create the runtime.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidExpression`] if a name cannot be resolved
    /// - [`Error::MissingTopic`] or [`Error::InvalidBinding`] if a resolved name is blank
    /// - [`Error::DuplicateTopic`] if two descriptors resolve to the same topic
    /// - [`Error::InvalidConfig`] if `poll_interval` is zero
    pub fn build(self) -> Result<WorkerRuntime<S>> {
        if self.config.poll_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "poll_interval must be greater than zero".to_string(),
            ));
        }

        let mut registry = HandlerRegistry::new();
        for descriptor in self.descriptors {
            let descriptor = match &self.resolver {
                Some(resolver) => descriptor.resolve_names(resolver.as_ref())?,
                None => descriptor,
            };
            registry.insert(descriptor)?;
        }

        let worker_id = self
            .config
            .worker_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        Ok(WorkerRuntime {
            service: self.service,
            registry: Arc::new(registry),
            executor: self.executor,
            config: self.config,
            worker_id,
        })
    }
}

/// Task worker runtime.
///
/// Fetches and locks tasks for every registered topic, executes them with
/// their descriptor, and reports each outcome to the task service.
///
/// # Lifecycle
///
/// 1. Create with [`WorkerRuntime::builder(service)`](WorkerRuntime::builder)
/// 2. Register handlers with [`WorkerBuilder::register()`]
/// 3. Configure with [`WorkerBuilder::config()`]
/// 4. Build with [`WorkerBuilder::build()`]
/// 5. Run with [`WorkerRuntime::run()`], or drive single polls with
///    [`WorkerRuntime::poll_once()`]
#[derive(Clone)]
pub struct WorkerRuntime<S>
where
    S: TaskSource + TaskService,
{
    service: S,
    registry: Arc<HandlerRegistry>,
    executor: TaskExecutor,
    config: WorkerConfig,
    worker_id: String,
}

impl<S> WorkerRuntime<S>
where
    S: TaskSource + TaskService,
{
    /// Create a new runtime builder.
    pub fn builder(service: S) -> WorkerBuilder<S> {
        WorkerBuilder::new(service)
    }

    /// Returns the runtime configuration.
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Returns the worker identifier.
    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Returns the handler registry.
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Returns the number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.registry.len()
    }

    /// Run the task workers until shutdown signal.
    ///
    /// Spawns `workers` task workers that poll at `poll_interval`.
    ///
    /// # Shutdown Behavior
    ///
    /// When the shutdown future completes:
    /// 1. All workers stop fetching new tasks
    /// 2. Wait for the current batch (if any) to complete
    /// 3. Return cleanly after `shutdown_timeout`
    ///
    /// # Example
    ///
    /// ```ignore
    /// use tokio::signal;
    ///
    /// let runtime = WorkerRuntime::builder(service)
    ///     .register(charge_card)
    ///     .config(WorkerConfig {
    ///         workers: 4,
    ///         ..Default::default()
    ///     })
    ///     .build()?;
    ///
    /// // Run until Ctrl+C
    /// runtime.run(async { signal::ctrl_c().await.ok(); }).await?;
    /// ```
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let worker_count = self.config.workers.max(1);

        info!(
            worker_id = %self.worker_id,
            topics = self.handler_count(),
            workers = worker_count,
            "Runtime starting"
        );

        let runtime = Arc::new(self);
        let mut worker_handles = Vec::new();

        for i in 0..worker_count {
            let worker_id = if worker_count == 1 {
                runtime.worker_id.clone()
            } else {
                format!("{}-{}", runtime.worker_id, i)
            };

            let worker = TaskWorker::new(Arc::clone(&runtime), worker_id);
            let worker_shutdown_rx = shutdown_rx.clone();
            let handle = tokio::spawn(async move {
                worker.run(worker_shutdown_rx).await;
            });
            worker_handles.push(handle);
        }

        // Wait for shutdown signal
        shutdown.await;

        // Signal shutdown to all workers
        let _ = shutdown_tx.send(true);

        // Wait for all workers with timeout
        let shutdown_timeout = runtime.config.shutdown_timeout;
        let all_workers = async {
            for handle in worker_handles {
                let _ = handle.await;
            }
        };

        match tokio::time::timeout(shutdown_timeout, all_workers).await {
            Ok(()) => {
                info!(worker_id = %runtime.worker_id, "Runtime stopped gracefully");
            }
            Err(_) => {
                warn!(
                    worker_id = %runtime.worker_id,
                    timeout_secs = shutdown_timeout.as_secs(),
                    "Shutdown timeout exceeded, forcing stop"
                );
            }
        }

        Ok(())
    }

    /// Fetch one batch under the runtime's worker id and process it.
    ///
    /// Returns the number of tasks processed.
    pub async fn poll_once(&self) -> Result<usize> {
        self.poll(&self.worker_id).await
    }

    /// Fetch one batch for `worker_id` and process every task in it.
    pub(crate) async fn poll(&self, worker_id: &str) -> Result<usize> {
        if self.registry.is_empty() {
            return Ok(0);
        }

        let tasks = self
            .service
            .fetch_and_lock(&self.fetch_request(worker_id))
            .await?;

        let count = tasks.len();
        for task in tasks {
            self.process(&task).await;
        }
        Ok(count)
    }

    fn fetch_request(&self, worker_id: &str) -> FetchRequest {
        let mut request = FetchRequest::new(worker_id, self.config.max_tasks)
            .use_priority(self.config.use_priority);
        for descriptor in self.registry.descriptors() {
            let lock_duration = descriptor
                .lock_duration()
                .unwrap_or(self.config.lock_duration);
            request = request.topic(descriptor.topic(), lock_duration);
        }
        request
    }

    /// Execute one locked task and report its outcome.
    async fn process(&self, task: &ExternalTask) {
        debug!(
            task_id = %task.id(),
            topic = %task.topic(),
            "Processing task"
        );

        let Some(descriptor) = self.registry.get(task.topic()) else {
            // No handler can ever run this task
            let message = format!("no handler registered for topic '{}'", task.topic());
            warn!(task_id = %task.id(), error = %message, "Incident: unknown topic");
            if let Err(e) = self
                .service
                .report_failure(
                    task,
                    &message,
                    &format!("{UNKNOWN_TOPIC}: {message}"),
                    0,
                    Duration::ZERO,
                )
                .await
            {
                error!(task_id = %task.id(), error = %e, "Failed to report unknown topic");
            }
            return;
        };

        let outcome = self.executor.execute(task, descriptor).await;
        let kind = outcome.kind();

        if let Err(e) = dispatch(&self.service, task, outcome, &self.config.retry_policy).await {
            error!(
                task_id = %task.id(),
                outcome = kind,
                error = %e,
                "Failed to report task outcome"
            );
        }
    }
}
