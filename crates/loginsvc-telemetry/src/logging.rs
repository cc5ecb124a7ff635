//! Structured logging setup.
//!
//! Installs a `tracing-subscriber` registry with an [`EnvFilter`] and one fmt
//! layer. JSON output is the production default; [`LogConfig::development`]
//! switches to the pretty formatter.
//!
//! # Example
//!
//! ```rust,ignore
//! use loginsvc_telemetry::logging::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::development())?;
//! tracing::info!(method = "name", "resolving");
//! ```

use crate::error::TelemetryError;
use crate::TelemetryResult;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Whether logging is enabled.
    pub enabled: bool,

    /// Filter directive (e.g., "info", "loginsvc_server=debug,h2=warn").
    pub level: String,

    /// Whether to output JSON.
    pub json_format: bool,

    /// Whether to include span events (new, close).
    pub span_events: bool,

    /// Whether to include file/line info.
    pub file_line_info: bool,

    /// Whether to include the event target (module path).
    pub include_target: bool,

    /// Service name, for reference by callers composing extra layers.
    pub service_name: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::production()
    }
}

impl LogConfig {
    /// Human-readable output at debug level.
    #[must_use]
    pub fn development() -> Self {
        Self {
            enabled: true,
            level: "debug".to_string(),
            json_format: false,
            span_events: true,
            file_line_info: true,
            include_target: true,
            service_name: crate::config::DEFAULT_SERVICE_NAME.to_string(),
        }
    }

    /// JSON output at info level.
    #[must_use]
    pub fn production() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            json_format: true,
            span_events: false,
            file_line_info: false,
            include_target: true,
            service_name: crate::config::DEFAULT_SERVICE_NAME.to_string(),
        }
    }
}

/// Installs the global log subscriber.
///
/// Fails with [`TelemetryError::LoggingInit`] when the filter is invalid or a
/// global subscriber is already set.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let filter = create_env_filter(&config.level)?;

    let span_events = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    if config.json_format {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_span_events(span_events)
            .with_file(config.file_line_info)
            .with_line_number(config.file_line_info)
            .with_target(config.include_target)
            .with_filter(filter);

        tracing_subscriber::registry()
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_span_events(span_events)
            .with_file(config.file_line_info)
            .with_line_number(config.file_line_info)
            .with_target(config.include_target)
            .with_filter(filter);

        tracing_subscriber::registry()
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    }

    Ok(())
}

/// Parses a filter directive.
///
/// `RUST_LOG`, when set, takes precedence over `default`.
pub fn create_env_filter(default: &str) -> TelemetryResult<EnvFilter> {
    match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directive) if !directive.is_empty() => EnvFilter::try_new(directive),
        _ => EnvFilter::try_new(default),
    }
    .map_err(|e| TelemetryError::LoggingInit(format!("invalid log filter: {e}")))
}

/// Standard log field names.
///
/// The logging middleware and the transport adapters emit these keys.
pub mod fields {
    /// Operation name.
    pub const METHOD: &str = "method";

    /// Debug rendering of the request.
    pub const INPUT: &str = "input";

    /// Debug rendering of the response.
    pub const OUTPUT: &str = "output";

    /// Error message, empty on success.
    pub const ERROR: &str = "error";

    /// Call duration in milliseconds.
    pub const TOOK_MS: &str = "took_ms";

    /// Request ID.
    pub const REQUEST_ID: &str = "request_id";

    /// Trace ID.
    pub const TRACE_ID: &str = "trace_id";

    /// Span ID.
    pub const SPAN_ID: &str = "span_id";

    /// Transport that carried the call (`http` or `grpc`).
    pub const TRANSPORT: &str = "transport";

    /// Peer address.
    pub const REMOTE_ADDR: &str = "remote_addr";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_production() {
        let config = LogConfig::default();
        assert!(config.enabled);
        assert!(config.json_format);
        assert_eq!(config.level, "info");
        assert_eq!(config.service_name, "loginsvc");
    }

    #[test]
    fn test_development_config() {
        let config = LogConfig::development();
        assert!(!config.json_format);
        assert!(config.span_events);
        assert_eq!(config.level, "debug");
    }

    #[test]
    fn test_field_names() {
        assert_eq!(fields::METHOD, "method");
        assert_eq!(fields::TOOK_MS, "took_ms");
        assert_eq!(fields::TRACE_ID, "trace_id");
    }

    #[test]
    fn test_create_env_filter() {
        assert!(create_env_filter("loginsvc_server=debug,info").is_ok());
    }

    #[test]
    fn test_disabled_logging_is_noop() {
        let config = LogConfig {
            enabled: false,
            ..LogConfig::default()
        };
        assert!(init_logging(&config).is_ok());
    }
}
