//! Task worker polling the task service.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, error, info};

use super::registry::WorkerRuntime;
use crate::service::{TaskService, TaskSource};

/// Task worker that polls the task service for every registered topic.
///
/// # Lifecycle
///
/// 1. Poll at `poll_interval`
/// 2. Fetch and lock up to `max_tasks` tasks
/// 3. Execute each task with its descriptor, one at a time
/// 4. Report each outcome to the task service
/// 5. Repeat until shutdown signal
pub(crate) struct TaskWorker<S>
where
    S: TaskSource + TaskService,
{
    runtime: Arc<WorkerRuntime<S>>,
    worker_id: String,
}

impl<S> TaskWorker<S>
where
    S: TaskSource + TaskService,
{
    pub fn new(runtime: Arc<WorkerRuntime<S>>, worker_id: String) -> Self {
        Self { runtime, worker_id }
    }

    /// Run the worker until shutdown signal.
    ///
    /// When the shutdown receiver signals, the worker finishes the current
    /// batch (if any) and exits.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut poll_interval = interval(self.runtime.config().poll_interval);
        poll_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        info!(worker_id = %self.worker_id, "Task worker started");

        loop {
            tokio::select! {
                _ = poll_interval.tick() => {
                    match self.runtime.poll(&self.worker_id).await {
                        Ok(0) => {}
                        Ok(count) => {
                            debug!(worker_id = %self.worker_id, count, "Processed batch");
                        }
                        Err(e) => {
                            error!(worker_id = %self.worker_id, error = %e, "Error fetching tasks");
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!(worker_id = %self.worker_id, "Task worker shutting down");
                        break;
                    }
                }
            }
        }
    }
}
