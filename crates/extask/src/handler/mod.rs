//! Handler declaration.
//!
//! A [`HandlerDescriptor`] binds a topic to a [`TaskHandler`] together with:
//!
//! - [`ParameterBinding`]s: where each argument comes from
//! - an optional [`ResultPolicy`]: how the return value is published
//! - [`ErrorMapping`]s: which failure categories are business errors
//!
//! Descriptors are built and validated once, then shared read-only by every
//! invocation.

mod binding;
mod descriptor;
mod mapping;
mod result;
mod task_handler;

pub use binding::{BindingSource, ParameterBinding};
pub use descriptor::{HandlerDescriptor, HandlerDescriptorBuilder};
pub use mapping::ErrorMapping;
pub(crate) use mapping::find_mapping;
pub use result::{NullPolicy, ResultPolicy};
pub use task_handler::{Args, Argument, HandlerFn, TaskHandler, handler_fn};
