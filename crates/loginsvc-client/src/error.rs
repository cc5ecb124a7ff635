//! Client construction errors.
//!
//! Errors from an individual call are [`ServiceError`](loginsvc_core::ServiceError)s;
//! these cover building a client in the first place.

use thiserror::Error;

/// Errors raised while constructing a client stub.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The target address is not a usable URL.
    #[error("invalid address '{addr}': {reason}")]
    InvalidAddress {
        /// The address as given.
        addr: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Building the HTTP client failed.
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    /// The gRPC connection could not be established.
    #[error("failed to connect to {addr}: {reason}")]
    Connect {
        /// The address dialed.
        addr: String,
        /// Connection failure message.
        reason: String,
    },
}

impl ClientError {
    /// Creates an invalid address error.
    pub fn invalid_address(addr: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidAddress {
            addr: addr.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates a connection error.
    pub fn connect(addr: impl Into<String>, reason: impl ToString) -> Self {
        Self::Connect {
            addr: addr.into(),
            reason: reason.to_string(),
        }
    }
}

/// Prefixes `http://` when `addr` carries no scheme.
pub(crate) fn with_scheme(addr: &str) -> String {
    if addr.contains("://") {
        addr.to_string()
    } else {
        format!("http://{addr}")
    }
}
