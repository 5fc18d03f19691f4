//! Task handler trait and resolved arguments.

use std::future::Future;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::failure::Failure;
use crate::task::ExternalTask;

/// A resolved handler argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    /// The task itself, for task bindings.
    Task(ExternalTask),
    /// A variable value; `None` when the variable was absent.
    Value(Option<Value>),
}

/// Ordered arguments passed to a handler, one per parameter binding.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Args(Vec<Argument>);

impl Args {
    /// Wrap resolved arguments.
    pub fn new(arguments: Vec<Argument>) -> Self {
        Self(arguments)
    }

    /// Number of arguments.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no arguments.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow an argument by position.
    pub fn argument(&self, index: usize) -> Option<&Argument> {
        self.0.get(index)
    }

    /// The task bound at `index`, if that binding is a task binding.
    pub fn task(&self, index: usize) -> Option<&ExternalTask> {
        match self.0.get(index) {
            Some(Argument::Task(task)) => Some(task),
            _ => None,
        }
    }

    /// The raw value bound at `index`. `None` for absent values and task bindings.
    pub fn value(&self, index: usize) -> Option<&Value> {
        match self.0.get(index) {
            Some(Argument::Value(value)) => value.as_ref(),
            _ => None,
        }
    }

    /// Deserialize the value bound at `index`.
    ///
    /// Returns `Ok(None)` for an absent value. A value that does not
    /// deserialize into `T` fails with a `SerializationError` failure.
    pub fn get<T: DeserializeOwned>(&self, index: usize) -> Result<Option<T>, Failure> {
        match self.0.get(index) {
            Some(Argument::Value(Some(value))) => Ok(Some(serde_json::from_value(value.clone())?)),
            Some(Argument::Value(None)) => Ok(None),
            Some(Argument::Task(_)) => Err(Failure::new(
                "IllegalArgument",
                format!("argument {index} is bound to the task, not a variable"),
            )),
            None => Err(Failure::new(
                "IllegalArgument",
                format!("argument {index} out of range for {} arguments", self.0.len()),
            )),
        }
    }

    /// Like [`get`](Self::get), but an absent value is a failure.
    pub fn require<T: DeserializeOwned>(&self, index: usize) -> Result<T, Failure> {
        self.get(index)?.ok_or_else(|| {
            Failure::new("IllegalArgument", format!("argument {index} has no value"))
        })
    }

    /// Iterate over the arguments in order.
    pub fn iter(&self) -> impl Iterator<Item = &Argument> {
        self.0.iter()
    }
}

/// Function invoked for tasks of one topic.
///
/// Handlers receive their arguments already resolved and coerced according
/// to the descriptor's parameter bindings, in declaration order.
///
/// # Results
///
/// | Result | Meaning |
/// |--------|---------|
/// | `Ok(Some(value))` | Success; `value` is published per the result policy |
/// | `Ok(None)` | Success with no value; the result policy's null policy applies |
/// | `Err(failure)` | Classified into a business error or a technical failure |
///
/// # Example
///
/// ```ignore
/// struct ChargeCard { gateway: Gateway }
///
/// #[async_trait]
/// impl TaskHandler for ChargeCard {
///     fn arity(&self) -> usize { 2 }
///
///     async fn handle(&self, args: Args) -> Result<Option<Value>, Failure> {
///         let amount: f64 = args.require(0)?;
///         let currency: String = args.require(1)?;
///         let receipt = self.gateway.charge(amount, &currency).await?;
///         Ok(Some(serde_json::to_value(receipt)?))
///     }
/// }
/// ```
#[async_trait]
pub trait TaskHandler: Send + Sync + 'static {
    /// Number of arguments this handler takes.
    fn arity(&self) -> usize;

    /// Run the handler.
    async fn handle(&self, args: Args) -> Result<Option<Value>, Failure>;
}

/// A [`TaskHandler`] backed by an async closure. Created by [`handler_fn`].
pub struct HandlerFn<F> {
    arity: usize,
    f: F,
}

/// Build a handler from an async closure taking [`Args`].
///
/// ```
/// use extask::{Args, Failure, handler_fn};
/// use serde_json::{Value, json};
///
/// let greet = handler_fn(1, |args: Args| async move {
///     let name: String = args.require(0)?;
///     Ok::<_, Failure>(Some(json!(format!("hello {name}"))))
/// });
/// # let _ = greet;
/// ```
pub fn handler_fn<F, Fut>(arity: usize, f: F) -> HandlerFn<F>
where
    F: Fn(Args) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<Value>, Failure>> + Send + 'static,
{
    HandlerFn { arity, f }
}

#[async_trait]
impl<F, Fut> TaskHandler for HandlerFn<F>
where
    F: Fn(Args) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<Value>, Failure>> + Send + 'static,
{
    fn arity(&self) -> usize {
        self.arity
    }

    async fn handle(&self, args: Args) -> Result<Option<Value>, Failure> {
        (self.f)(args).await
    }
}
