//! Request and response types for the name resolution operation.

use crate::error::{ServiceError, ServiceResult};

/// Input to the name resolution operation.
///
/// `name` is raw user input. The empty string is valid and is forwarded to
/// the lookup as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameRequest {
    /// The human-readable name to resolve.
    pub name: String,
}

impl NameRequest {
    /// Creates a request for the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Output of the name resolution operation.
///
/// A response with an empty `value` and no `error` is a found record whose
/// id is empty, which is distinct from a missing record.
///
/// # Example
///
/// ```
/// use loginsvc_core::{NameResponse, ServiceError};
///
/// let ok = NameResponse::found("a123456789");
/// assert_eq!(ok.into_result().unwrap(), "a123456789");
///
/// let missing = NameResponse::failed(ServiceError::not_found("bob"));
/// assert!(missing.value.is_empty());
/// assert!(missing.into_result().is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameResponse {
    /// The resolved subject identifier.
    pub value: String,
    /// The business error, if resolution failed.
    pub error: Option<ServiceError>,
}

impl NameResponse {
    /// Creates a successful response.
    #[must_use]
    pub fn found(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            error: None,
        }
    }

    /// Creates a response carrying a business error and an empty value.
    #[must_use]
    pub fn failed(error: ServiceError) -> Self {
        Self {
            value: String::new(),
            error: Some(error),
        }
    }

    /// Returns `true` if the response carries an error.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Converts the response into the value or its error.
    pub fn into_result(self) -> ServiceResult<String> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.value),
        }
    }
}

/// Reports whether a call outcome counts as a failure.
///
/// Middleware that reacts to failures (circuit breaking, span status,
/// logging, success counting) treats a response carrying a business error
/// the same as an endpoint error.
pub trait Outcome {
    /// Returns the error that made this outcome a failure, if any.
    fn failure(&self) -> Option<&ServiceError>;
}

impl Outcome for NameResponse {
    fn failure(&self) -> Option<&ServiceError> {
        self.error.as_ref()
    }
}

impl<T: Outcome> Outcome for ServiceResult<T> {
    fn failure(&self) -> Option<&ServiceError> {
        match self {
            Ok(response) => response.failure(),
            Err(error) => Some(error),
        }
    }
}
