//! Failure category to business error code mappings.

use crate::failure::Failure;

/// Maps a failure category to a business error code.
///
/// A mapping matches a failure whose category is, or descends from,
/// [`category`](Self::category).
///
/// # Example
///
/// ```
/// use extask::ErrorMapping;
///
/// let mapping = ErrorMapping::new("CardDeclined", "PAYMENT_REJECTED")
///     .message("The card was declined");
/// assert_eq!(mapping.code(), "PAYMENT_REJECTED");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMapping {
    category: String,
    code: String,
    message: Option<String>,
}

impl ErrorMapping {
    /// Map `category` to `code`, keeping the failure's own message.
    pub fn new(category: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            code: code.into(),
            message: None,
        }
    }

    /// Override the reported message.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// The matched failure category.
    pub fn category(&self) -> &str {
        &self.category
    }

    /// The business error code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// The override message, if set and non-empty.
    pub fn override_message(&self) -> Option<&str> {
        self.message.as_deref().filter(|message| !message.is_empty())
    }

    /// Returns `true` if the failure's category is exactly this mapping's.
    pub fn matches_exactly(&self, failure: &Failure) -> bool {
        failure.category().name() == self.category
    }

    /// Returns `true` if the failure is-a this mapping's category.
    pub fn matches(&self, failure: &Failure) -> bool {
        failure.is_a(&self.category)
    }

    /// Message reported for `failure`: the override if set, else the failure's own.
    pub fn message_for(&self, failure: &Failure) -> Option<String> {
        self.override_message()
            .or_else(|| failure.message())
            .map(str::to_string)
    }
}

/// Select the mapping for a failure.
///
/// An exact category match wins; otherwise the first mapping in declaration
/// order whose category the failure descends from.
pub(crate) fn find_mapping<'a>(
    mappings: &'a [ErrorMapping],
    failure: &Failure,
) -> Option<&'a ErrorMapping> {
    mappings
        .iter()
        .find(|mapping| mapping.matches_exactly(failure))
        .or_else(|| mappings.iter().find(|mapping| mapping.matches(failure)))
}
