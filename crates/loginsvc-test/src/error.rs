//! Harness errors.

use thiserror::Error;

/// Errors raised while starting or talking to a [`TestServer`](crate::TestServer).
#[derive(Debug, Error)]
pub enum TestError {
    /// The server failed to bind.
    #[error("server error: {0}")]
    Server(#[from] loginsvc_server::ServerError),

    /// A client could not be built.
    #[error("client error: {0}")]
    Client(#[from] loginsvc_client::ClientError),

    /// A raw HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A raw gRPC connection failed.
    #[error("gRPC connection failed: {0}")]
    Grpc(#[from] tonic::transport::Error),

    /// A response body was not JSON.
    #[error("invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),
}
