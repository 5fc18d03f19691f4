use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use extask::{
    ExternalTask, FetchRequest, HandlerDescriptor, InMemoryTaskService, PropertyResolver,
    RetryPolicy, TaskService, TaskSource, TaskState, Variables, WorkerConfig, WorkerRuntime,
};
use test_utils::wait_until;
use tokio::task::JoinHandle;

pub const TEST_MAX_RETRIES: u32 = 3;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Fast worker config for tests. Failed tasks are refetchable immediately.
pub fn test_worker_config() -> WorkerConfig {
    WorkerConfig {
        worker_id: Some("test-worker".to_string()),
        poll_interval: Duration::from_millis(20),
        shutdown_timeout: Duration::from_secs(5),
        retry_policy: RetryPolicy {
            max_retries: TEST_MAX_RETRIES,
            base_timeout: Duration::ZERO,
            ..Default::default()
        },
        ..Default::default()
    }
}

/// In-memory service that can also hand out tasks for topics nobody asked for.
#[derive(Clone)]
pub struct TestSource {
    inner: InMemoryTaskService,
    fetch_unknown: bool,
}

impl TaskSource for TestSource {
    async fn fetch_and_lock(&self, request: &FetchRequest) -> extask::Result<Vec<ExternalTask>> {
        if !self.fetch_unknown {
            return self.inner.fetch_and_lock(request).await;
        }

        let mut widened = request.clone();
        for topic in self.inner.topics().await {
            if widened.lock_duration_for(&topic).is_none() {
                widened = widened.topic(topic, Duration::from_secs(30));
            }
        }
        self.inner.fetch_and_lock(&widened).await
    }
}

impl TaskService for TestSource {
    async fn complete(&self, task: &ExternalTask, variables: Variables) -> extask::Result<()> {
        self.inner.complete(task, variables).await
    }

    async fn report_business_error(
        &self,
        task: &ExternalTask,
        code: &str,
        message: Option<&str>,
        variables: Variables,
    ) -> extask::Result<()> {
        self.inner
            .report_business_error(task, code, message, variables)
            .await
    }

    async fn report_failure(
        &self,
        task: &ExternalTask,
        message: &str,
        details: &str,
        retries: u32,
        retry_timeout: Duration,
    ) -> extask::Result<()> {
        self.inner
            .report_failure(task, message, details, retries, retry_timeout)
            .await
    }
}

/// Manages worker runtime lifecycle for tests.
pub struct TestApp {
    pub service: InMemoryTaskService,
    shutdown: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<JoinHandle<Result<()>>>,
}

pub struct TestAppBuilder {
    service: InMemoryTaskService,
    descriptors: Vec<HandlerDescriptor>,
    resolver: Option<PropertyResolver>,
    config: WorkerConfig,
    fetch_unknown: bool,
}

impl TestAppBuilder {
    pub fn new(service: InMemoryTaskService) -> Self {
        Self {
            service,
            descriptors: Vec::new(),
            resolver: None,
            config: test_worker_config(),
            fetch_unknown: false,
        }
    }

    pub fn register(mut self, descriptor: HandlerDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    #[allow(dead_code)]
    pub fn config(mut self, config: WorkerConfig) -> Self {
        self.config = config;
        self
    }

    #[allow(dead_code)]
    pub fn resolver(mut self, resolver: PropertyResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Also fetch tasks whose topic has no registered handler.
    #[allow(dead_code)]
    pub fn fetch_unknown_topics(mut self) -> Self {
        self.fetch_unknown = true;
        self
    }

    /// Build the runtime without starting it.
    pub fn build(self) -> extask::Result<WorkerRuntime<TestSource>> {
        let source = TestSource {
            inner: self.service,
            fetch_unknown: self.fetch_unknown,
        };

        let mut builder = WorkerRuntime::builder(source).config(self.config);
        if let Some(resolver) = self.resolver {
            builder = builder.resolver(resolver);
        }
        for descriptor in self.descriptors {
            builder = builder.register(descriptor);
        }
        builder.build()
    }

    /// Build the runtime and spawn it in the background.
    pub fn build_and_run(self) -> Result<TestApp> {
        let service = self.service.clone();
        let runtime = self.build()?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            runtime
                .run(async move {
                    let _ = shutdown_rx.await;
                })
                .await
                .map_err(anyhow::Error::from)
        });

        Ok(TestApp {
            service,
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }
}

impl TestApp {
    pub fn builder(service: &InMemoryTaskService) -> TestAppBuilder {
        TestAppBuilder::new(service.clone())
    }

    /// Signal shutdown and wait for the runtime to return.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let handle = self.handle.take().context("runtime already joined")?;
        handle.await.context("runtime task panicked")?
    }

    /// Wait until the task reaches `state`.
    pub async fn wait_for_state(&self, task_id: &str, state: TaskState) -> Result<()> {
        wait_until(DEFAULT_TEST_TIMEOUT, DEFAULT_POLL_INTERVAL, || async {
            match self.service.state_of(task_id).await {
                Some(current) if current == state => Ok(Some(())),
                Some(_) => Ok(None),
                None => Err(anyhow!("unknown task {task_id}")),
            }
        })
        .await
        .with_context(|| format!("task {task_id} never reached {state:?}"))
    }

    /// Wait until no task is open.
    #[allow(dead_code)]
    pub async fn wait_for_drain(&self) -> Result<()> {
        wait_until(DEFAULT_TEST_TIMEOUT, DEFAULT_POLL_INTERVAL, || async {
            Ok((self.service.open_count().await == 0).then_some(()))
        })
        .await
        .context("open tasks never drained")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Variables for a task that needs none.
pub fn no_variables() -> Vec<(&'static str, serde_json::Value)> {
    Vec::new()
}
