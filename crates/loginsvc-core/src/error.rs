//! Error types for loginsvc.
//!
//! [`ServiceError`] is the one error type that flows through endpoints,
//! middleware and transport adapters. Every variant belongs to an
//! [`ErrorCategory`]:
//!
//! | `ErrorCategory` | Variants | HTTP status | Raised by |
//! |---|---|---|---|
//! | `Overload` | `RateLimited` | 429 | rate limiter |
//! | `Unavailable` | `Unavailable` | 503 | circuit breaker |
//! | `NotFound` | `NotFound` | 500 | domain operation |
//! | `Transport` | `Malformed`, `DeadlineExceeded`, `Transport` | 400 / 504 / 502 | adapters |
//! | `Unknown` | `Unknown`, `Remote` | 500 | collaborator, RPC client |
//!
//! `NotFound` deliberately maps to 500: business errors are server errors
//! unless classified client-side (see [`ServiceError::is_client_error`]).

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using [`ServiceError`].
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Categories of errors for classification and handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Rejected before any work because the rate limit was exceeded.
    Overload,
    /// Rejected because the circuit breaker is open.
    Unavailable,
    /// The lookup found no record for the name.
    NotFound,
    /// Malformed payload, connection failure or deadline exceeded.
    Transport,
    /// Any other error.
    Unknown,
}

impl ErrorCategory {
    /// Returns the category name used in logs and metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Overload => "overload",
            Self::Unavailable => "unavailable",
            Self::NotFound => "not_found",
            Self::Transport => "transport",
            Self::Unknown => "unknown",
        }
    }
}

/// Standard error type for loginsvc.
///
/// The `Display` output of [`ServiceError::Transport`], [`ServiceError::Remote`]
/// and [`ServiceError::Unknown`] is exactly the carried message, so a message
/// written by a server compares equal to the one a client reads back.
///
/// # Example
///
/// ```
/// use loginsvc_core::{ErrorCategory, ServiceError};
///
/// let err = ServiceError::not_found("bob");
/// assert_eq!(err.category(), ErrorCategory::NotFound);
/// assert_eq!(err.status_code().as_u16(), 500);
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Rate limit exceeded; no token was available.
    #[error("rate limit exceeded")]
    RateLimited,

    /// The circuit breaker rejected the call.
    #[error("circuit breaker '{breaker}' is open")]
    Unavailable {
        /// Name of the breaker that rejected the call.
        breaker: String,
    },

    /// No record exists for the requested name.
    #[error("no subject found for name {name:?}")]
    NotFound {
        /// The name that was looked up.
        name: String,
    },

    /// The wire payload could not be decoded.
    #[error("malformed request: {message}")]
    Malformed {
        /// Decoder error message.
        message: String,
    },

    /// The call deadline elapsed before a response arrived.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// Connection failure or a non-success transport status.
    #[error("{message}")]
    Transport {
        /// Human-readable error message.
        message: String,
    },

    /// An error received as a bare message over the RPC transport.
    ///
    /// The RPC schema carries errors as a string, so the original
    /// classification is gone by the time a client sees it.
    #[error("{message}")]
    Remote {
        /// The message sent by the server.
        message: String,
    },

    /// An unclassified collaborator error.
    #[error("{message}")]
    Unknown {
        /// Human-readable error message.
        message: String,
    },
}

impl ServiceError {
    /// Creates a circuit-open error for the named breaker.
    #[must_use]
    pub fn unavailable(breaker: impl Into<String>) -> Self {
        Self::Unavailable {
            breaker: breaker.into(),
        }
    }

    /// Creates a not found error.
    #[must_use]
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// Creates a malformed payload error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    /// Creates a transport error.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a remote error from an RPC error string.
    #[must_use]
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
        }
    }

    /// Creates an unknown error.
    #[must_use]
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown {
            message: message.into(),
        }
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::RateLimited => ErrorCategory::Overload,
            Self::Unavailable { .. } => ErrorCategory::Unavailable,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Malformed { .. } | Self::DeadlineExceeded | Self::Transport { .. } => {
                ErrorCategory::Transport
            }
            Self::Remote { .. } | Self::Unknown { .. } => ErrorCategory::Unknown,
        }
    }

    /// Returns `true` if the caller is at fault.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::Malformed { .. })
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
            Self::Transport { .. } => StatusCode::BAD_GATEWAY,
            _ if self.is_client_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Errors returned by a [`Lookup`](crate::Lookup) collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// No record matches the name.
    #[error("no matching record")]
    NotFound,

    /// The backing store failed.
    #[error("{message}")]
    Backend {
        /// Backend error message.
        message: String,
    },
}

impl LookupError {
    /// Creates a backend error.
    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}
