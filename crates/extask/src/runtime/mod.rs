//! Runtime for fetching and executing external tasks.
//!
//! This module provides the infrastructure around the executor:
//!
//! - [`WorkerRuntime`]: runs task workers against a task service
//! - [`WorkerBuilder`]: registers handlers and configures the runtime
//! - [`HandlerRegistry`]: topic to descriptor mapping
//! - [`NameResolver`]: registration-time name resolution
//! - [`WorkerConfig`]: polling, locking, retries and concurrency
//!
//! # Example
//!
//! ```ignore
//! use extask::{InMemoryTaskService, WorkerConfig, WorkerRuntime};
//!
//! let runtime = WorkerRuntime::builder(service)
//!     .register(charge_card)
//!     .register(send_invoice)
//!     .config(WorkerConfig::default())
//!     .build()?;
//!
//! runtime.run(shutdown_signal).await?;
//! ```

mod config;
mod registry;
mod resolver;
mod task_worker;

pub use config::WorkerConfig;
pub use registry::{HandlerRegistry, WorkerBuilder, WorkerRuntime};
pub use resolver::{NameResolver, PropertyResolver};
