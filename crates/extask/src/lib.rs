//! External task workers for workflow engines.
//!
//! Extask binds async Rust functions to externally-dispatched workflow tasks:
//!
//! - **Declarative binding** — a [`HandlerDescriptor`] states where each
//!   argument comes from and how the return value is published
//! - **Failure classification** — handler failures become business errors
//!   through [`ErrorMapping`]s, or retryable technical failures otherwise
//! - **Retries with backoff** — [`RetryPolicy`] counts a task's retry budget
//!   down until the coordination service raises an incident
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         WorkerRuntime<S>                                │
//! │                                                                         │
//! │   1. fetch_and_lock(topics) → tasks                                     │
//! │   2. Look up HandlerDescriptor by topic                                 │
//! │   3. TaskExecutor: resolve arguments → invoke handler → Outcome         │
//! │   4. dispatch(Outcome) → complete | business error | failure            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use extask::{
//!     Args, ErrorMapping, Failure, HandlerDescriptor, InMemoryTaskService, ParameterBinding,
//!     ResultPolicy, TargetShape, TaskFailure, WorkerRuntime, handler_fn,
//! };
//!
//! #[derive(Debug, thiserror::Error, TaskFailure)]
//! enum PaymentError {
//!     #[error("card declined")]
//!     Declined,
//! }
//!
//! let charge = HandlerDescriptor::builder(
//!     "charge-card",
//!     handler_fn(1, |args: Args| async move {
//!         let amount: f64 = args.require(0)?;
//!         if amount > 1000.0 {
//!             return Err(PaymentError::Declined.into());
//!         }
//!         Ok(Some(serde_json::json!({ "charged": amount })))
//!     }),
//! )
//! .bind(ParameterBinding::variable("amount").required().shape(TargetShape::Float))
//! .result(ResultPolicy::named("receipt"))
//! .map_error(ErrorMapping::new("Declined", "PAYMENT_REJECTED"))
//! .build()?;
//!
//! let runtime = WorkerRuntime::builder(InMemoryTaskService::new())
//!     .register(charge)
//!     .build()?;
//!
//! runtime.run(async { tokio::signal::ctrl_c().await.ok(); }).await?;
//! ```
//!
//! # Design Documentation
//!
//! See `DESIGN.md` for architectural decisions.

// Allow the crate to reference itself as `extask` for macro-generated code
extern crate self as extask;

pub mod convert;
mod error;
pub mod execution;
mod failure;
pub mod handler;
pub mod runtime;
pub mod service;
mod task;

pub use convert::{ConversionError, Converter, JsonConverter, TargetShape};
pub use error::{Error, Result};
pub use execution::{
    ExecutionError, Outcome, RetryPolicy, RetrySchedule, TaskExecutor, dispatch,
};
pub use failure::{BoxError, Category, Failure, FailureCategory};
pub use handler::{
    Args, Argument, BindingSource, ErrorMapping, HandlerDescriptor, HandlerDescriptorBuilder,
    HandlerFn, NullPolicy, ParameterBinding, ResultPolicy, TaskHandler, handler_fn,
};
pub use runtime::{
    HandlerRegistry, NameResolver, PropertyResolver, WorkerBuilder, WorkerConfig, WorkerRuntime,
};
pub use service::{
    FetchRequest, InMemoryTaskService, Incident, Reported, TaskService, TaskSource, TaskState,
    TopicRequest,
};
pub use task::{ExternalTask, Variables};

// Re-export derive macros
pub use extask_macros::TaskFailure;
