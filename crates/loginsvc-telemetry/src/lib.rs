//! Observability for loginsvc.
//!
//! - **Logging**: `tracing-subscriber` with JSON or pretty output
//! - **Metrics**: Prometheus exposition via the `metrics` facade
//! - **Tracing**: tracer backends for the middleware's [`Tracer`] interface,
//!   with OTLP export through OpenTelemetry
//!
//! # Tracer Backends
//!
//! | Backend | Use |
//! |---------|-----|
//! | [`NoopTracer`](loginsvc_core::NoopTracer) | Propagation only (in `loginsvc-core`) |
//! | [`LogTracer`] | Finished spans as log events |
//! | [`RecordingTracer`] | In-memory, for tests |
//! | [`OtelTracer`] | OpenTelemetry, exported over OTLP |
//!
//! # Example
//!
//! ```rust,ignore
//! use loginsvc_telemetry::{init_telemetry, TelemetryConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = TelemetryConfig::builder()
//!         .service_name("loginsvc")
//!         .metrics_addr("0.0.0.0:9090")
//!         .build();
//!
//!     let _guard = init_telemetry(config)?;
//!     Ok(())
//! }
//! ```
//!
//! [`Tracer`]: loginsvc_core::Tracer

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod tracer;
pub mod tracing;

pub use config::{TelemetryConfig, TelemetryConfigBuilder};
pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig};
pub use metrics::{init_metrics, MetricsConfig};
pub use tracer::{FinishedSpan, LogTracer, RecordingTracer};
pub use tracing::{init_tracing, OtelTracer, TracingConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Flushes and shuts down the tracer provider when dropped.
///
/// Keep it alive for the lifetime of the process.
pub struct TelemetryGuard {
    tracer_provider: Option<opentelemetry_sdk::trace::TracerProvider>,
}

impl TelemetryGuard {
    /// Creates a guard owning `tracer_provider`.
    #[must_use]
    pub fn new(tracer_provider: Option<opentelemetry_sdk::trace::TracerProvider>) -> Self {
        Self { tracer_provider }
    }

    /// Returns true if spans are exported over OTLP.
    pub const fn exports_spans(&self) -> bool {
        self.tracer_provider.is_some()
    }
}

impl std::fmt::Debug for TelemetryGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryGuard")
            .field("exports_spans", &self.exports_spans())
            .finish()
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.tracer_provider.take() {
            for result in provider.force_flush() {
                if let Err(e) = result {
                    eprintln!("Error flushing tracer provider: {e}");
                }
            }
            if let Err(e) = provider.shutdown() {
                eprintln!("Error shutting down tracer provider: {e}");
            }
        }
    }
}

/// Initializes logging, then metrics, then span export.
///
/// Must be called from within a Tokio runtime when metrics or span export
/// are enabled.
pub fn init_telemetry(config: TelemetryConfig) -> TelemetryResult<TelemetryGuard> {
    init_logging(&config.logging)?;
    init_metrics(&config.metrics)?;
    let tracer_provider = init_tracing(&config.tracing)?;

    Ok(TelemetryGuard::new(tracer_provider))
}
