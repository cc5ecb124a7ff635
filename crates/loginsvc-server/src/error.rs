//! Server error types.

use std::net::SocketAddr;
use thiserror::Error;

/// Errors that stop a server from starting or running.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A configured listen address does not parse.
    #[error("invalid address '{addr}': {reason}")]
    InvalidAddress {
        /// The offending address.
        addr: String,
        /// Parser message.
        reason: String,
    },

    /// Binding a listener failed.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        /// The address that could not be bound.
        addr: SocketAddr,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// I/O failure on a bound listener.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The gRPC server failed.
    #[error("gRPC server error: {0}")]
    Grpc(#[from] tonic::transport::Error),
}

impl ServerError {
    /// Creates an invalid address error.
    pub fn invalid_address(addr: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidAddress {
            addr: addr.into(),
            reason: reason.to_string(),
        }
    }
}
