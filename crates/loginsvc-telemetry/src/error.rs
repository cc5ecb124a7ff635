//! Telemetry error types.

use thiserror::Error;

/// Errors that can occur while setting up telemetry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The Prometheus recorder could not be installed.
    #[error("Failed to initialize metrics: {0}")]
    MetricsInit(String),

    /// The OpenTelemetry pipeline could not be built.
    #[error("Failed to initialize tracing: {0}")]
    TracingInit(String),

    /// The log subscriber could not be installed.
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    /// A listen address did not parse.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}
