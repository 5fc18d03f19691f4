//! Failure categories and the failure type returned by task handlers.
//!
//! A handler signals problems by returning a [`Failure`]. Every failure
//! carries a [`Category`]: a name plus an ordered list of ancestor names.
//! Error mappings on a handler descriptor refer to categories by name and
//! match through [`Category::is_a`], so a mapping for a parent category also
//! catches its sub-categories.
//!
//! Application error types declare their category by implementing
//! [`FailureCategory`], usually through `#[derive(TaskFailure)]`:
//!
//! ```
//! use extask::{Failure, FailureCategory, TaskFailure};
//!
//! #[derive(Debug, TaskFailure)]
//! #[failure(extends = "PaymentFailure")]
//! enum CardError {
//!     Declined,
//!     #[failure(category = "CardExpired")]
//!     Expired,
//! }
//!
//! impl std::fmt::Display for CardError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         f.write_str("card rejected")
//!     }
//! }
//!
//! impl std::error::Error for CardError {}
//!
//! let failure = Failure::from(CardError::Expired);
//! assert_eq!(failure.category().name(), "CardExpired");
//! assert!(failure.is_a("CardError"));
//! assert!(failure.is_a("PaymentFailure"));
//! assert!(!failure.is_a("Declined"));
//! ```

use std::borrow::Cow;
use std::fmt;

/// Boxed error used as the source of a [`Failure`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A named failure category with its is-a ancestry.
///
/// Every category is implicitly a descendant of [`Category::ROOT`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Category {
    name: Cow<'static, str>,
    ancestors: Vec<Cow<'static, str>>,
}

impl Category {
    /// The root category every failure belongs to.
    pub const ROOT: &'static str = "Error";

    /// Create a category with no declared ancestors.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            ancestors: Vec::new(),
        }
    }

    /// Declare an ancestor. Ancestors are kept in declaration order, nearest first.
    pub fn extends(mut self, ancestor: impl Into<Cow<'static, str>>) -> Self {
        let ancestor = ancestor.into();
        if ancestor != self.name && !self.ancestors.contains(&ancestor) {
            self.ancestors.push(ancestor);
        }
        self
    }

    /// The category name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared ancestors, nearest first.
    pub fn ancestors(&self) -> impl Iterator<Item = &str> {
        self.ancestors.iter().map(|a| a.as_ref())
    }

    /// Returns `true` if this category is `category` or descends from it.
    pub fn is_a(&self, category: &str) -> bool {
        category == Self::ROOT || self.name == category || self.ancestors().any(|a| a == category)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl From<&'static str> for Category {
    fn from(name: &'static str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Category {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// Declares the failure category of an error type.
///
/// Usually derived with `#[derive(TaskFailure)]`. Any type implementing this
/// trait together with [`std::error::Error`] converts into a [`Failure`], so
/// handlers can use `?` directly.
pub trait FailureCategory {
    /// The category of this particular error value.
    fn category(&self) -> Category;
}

impl FailureCategory for serde_json::Error {
    fn category(&self) -> Category {
        Category::new("SerializationError")
    }
}

impl FailureCategory for std::io::Error {
    fn category(&self) -> Category {
        Category::new("IoError")
    }
}

/// A failure raised by a task handler.
///
/// A failure may wrap another failure (see [`Failure::wrap`]); classification
/// always looks at the [underlying](Failure::underlying) cause.
#[derive(Debug)]
pub struct Failure {
    category: Category,
    message: Option<String>,
    source: Option<BoxError>,
    cause: Option<Box<Failure>>,
}

impl Failure {
    /// Category used for failures that only wrap another failure.
    pub const WRAPPER: &'static str = "InvocationError";

    /// Create a failure with a category and message.
    pub fn new(category: impl Into<Category>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            category: category.into(),
            message: (!message.is_empty()).then_some(message),
            source: None,
            cause: None,
        }
    }

    /// Create a failure with a category and no message.
    pub fn bare(category: impl Into<Category>) -> Self {
        Self {
            category: category.into(),
            message: None,
            source: None,
            cause: None,
        }
    }

    /// Capture an application error, keeping it as the source.
    pub fn from_error<E>(error: E) -> Self
    where
        E: FailureCategory + std::error::Error + Send + Sync + 'static,
    {
        let message = error.to_string();
        Self {
            category: error.category(),
            message: (!message.is_empty()).then_some(message),
            source: Some(Box::new(error)),
            cause: None,
        }
    }

    /// Wrap a failure raised by a nested invocation.
    pub fn wrap(cause: Failure) -> Self {
        Self {
            category: Category::new(Self::WRAPPER),
            message: None,
            source: None,
            cause: Some(Box::new(cause)),
        }
    }

    /// The category of this failure.
    pub fn category(&self) -> &Category {
        &self.category
    }

    /// The failure message, if any.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// The wrapped failure, if this failure is a wrapper.
    pub fn cause(&self) -> Option<&Failure> {
        self.cause.as_deref()
    }

    /// The failure to classify: the wrapped cause if present, else `self`.
    ///
    /// Only one level of wrapping is removed.
    pub fn underlying(&self) -> &Failure {
        self.cause.as_deref().unwrap_or(self)
    }

    /// Owned variant of [`underlying`](Self::underlying).
    pub fn into_underlying(self) -> Failure {
        match self.cause {
            Some(cause) => *cause,
            None => self,
        }
    }

    /// Returns `true` if this failure's category is or descends from `category`.
    pub fn is_a(&self, category: &str) -> bool {
        self.category.is_a(category)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.message, &self.cause) {
            (Some(message), _) => write!(f, "{}: {}", self.category, message),
            (None, Some(cause)) => write!(f, "{}: {}", self.category, cause),
            (None, None) => write!(f, "{}", self.category),
        }
    }
}

impl std::error::Error for Failure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        if let Some(cause) = &self.cause {
            return Some(cause.as_ref());
        }
        self.source
            .as_deref()
            .map(|source| source as &(dyn std::error::Error + 'static))
    }
}

impl<E> From<E> for Failure
where
    E: FailureCategory + std::error::Error + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Self::from_error(error)
    }
}
