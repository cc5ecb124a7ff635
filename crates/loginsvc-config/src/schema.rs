//! Configuration schema types.
//!
//! Every section rejects unknown fields and falls back to its defaults for
//! fields that are not given.

use loginsvc_middleware::{BreakerSettings, RateLimitConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Server configuration section.
///
/// # Example
///
/// ```
/// use loginsvc_config::ServerConfig;
///
/// let config = ServerConfig::default();
/// assert_eq!(config.http_addr, "0.0.0.0:8081");
/// assert_eq!(config.grpc_addr, "0.0.0.0:8082");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// HTTP listen address.
    #[serde(default = "default_http_addr")]
    pub http_addr: String,

    /// gRPC listen address.
    #[serde(default = "default_grpc_addr")]
    pub grpc_addr: String,

    /// Per-call deadline in milliseconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

impl ServerConfig {
    /// Per-call deadline.
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Graceful shutdown timeout.
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            grpc_addr: default_grpc_addr(),
            request_timeout_ms: default_request_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

fn default_http_addr() -> String {
    "0.0.0.0:8081".to_string()
}

fn default_grpc_addr() -> String {
    "0.0.0.0:8082".to_string()
}

fn default_request_timeout() -> u64 {
    30_000
}

fn default_shutdown_timeout() -> u64 {
    30
}

/// Rate limiter section: a token bucket per operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RateLimitSection {
    /// Bucket capacity.
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Milliseconds to gain one token.
    #[serde(default = "default_refill_interval")]
    pub refill_interval_ms: u64,
}

impl RateLimitSection {
    /// Converts the section into limiter configuration.
    pub const fn to_config(&self) -> RateLimitConfig {
        RateLimitConfig {
            burst: self.burst,
            refill_interval: Duration::from_millis(self.refill_interval_ms),
        }
    }
}

impl Default for RateLimitSection {
    fn default() -> Self {
        Self {
            burst: default_burst(),
            refill_interval_ms: default_refill_interval(),
        }
    }
}

fn default_burst() -> u32 {
    1
}

fn default_refill_interval() -> u64 {
    1_000
}

/// Circuit breaker section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CircuitBreakerSection {
    /// Consecutive failures that trip the breaker.
    #[serde(default = "default_consecutive_failures")]
    pub consecutive_failures: u32,

    /// Failure share that also trips the breaker.
    #[serde(default)]
    pub failure_ratio: Option<f64>,

    /// Calls needed before `failure_ratio` applies.
    #[serde(default)]
    pub min_requests: u32,

    /// Milliseconds spent open before a trial call.
    #[serde(default = "default_open_timeout")]
    pub open_timeout_ms: u64,

    /// Milliseconds between count resets while closed. Unset means never.
    #[serde(default)]
    pub interval_ms: Option<u64>,

    /// Trial calls admitted while half-open.
    #[serde(default = "default_half_open_requests")]
    pub half_open_requests: u32,
}

impl CircuitBreakerSection {
    /// Converts the section into settings for a breaker named `name`.
    pub fn to_settings(&self, name: impl Into<String>) -> BreakerSettings {
        BreakerSettings {
            name: name.into(),
            consecutive_failures: self.consecutive_failures,
            failure_ratio: self.failure_ratio,
            min_requests: self.min_requests,
            open_timeout: Duration::from_millis(self.open_timeout_ms),
            interval: self.interval_ms.map(Duration::from_millis),
            half_open_requests: self.half_open_requests,
        }
    }
}

impl Default for CircuitBreakerSection {
    fn default() -> Self {
        Self {
            consecutive_failures: default_consecutive_failures(),
            failure_ratio: None,
            min_requests: 0,
            open_timeout_ms: default_open_timeout(),
            interval_ms: None,
            half_open_requests: default_half_open_requests(),
        }
    }
}

fn default_consecutive_failures() -> u32 {
    6
}

fn default_open_timeout() -> u64 {
    60_000
}

fn default_half_open_requests() -> u32 {
    1
}

/// Where subject ids are looked up.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LookupBackend {
    /// The `records` table below, held in memory.
    #[default]
    Memory,
    /// A SQLite database with a `users (name, sid)` table at `url`.
    Sqlite,
}

/// Lookup collaborator configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LookupConfig {
    /// Which store answers lookups.
    #[serde(default)]
    pub backend: LookupBackend,

    /// Connection URL, required for `sqlite` (e.g. `sqlite://users.db`).
    #[serde(default)]
    pub url: Option<String>,

    /// Name to subject id, served by the `memory` backend.
    #[serde(default = "default_records")]
    pub records: BTreeMap<String, String>,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            backend: LookupBackend::Memory,
            url: None,
            records: default_records(),
        }
    }
}

fn default_records() -> BTreeMap<String, String> {
    BTreeMap::from([("ed".to_string(), "a123456789".to_string())])
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Install the Prometheus recorder.
    #[serde(default)]
    pub enabled: bool,

    /// Scrape listener address.
    #[serde(default = "default_metrics_addr")]
    pub addr: String,

    /// Duration histogram buckets, in seconds.
    #[serde(default = "default_histogram_buckets")]
    pub histogram_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: default_metrics_addr(),
            histogram_buckets: default_histogram_buckets(),
        }
    }
}

fn default_metrics_addr() -> String {
    "0.0.0.0:9090".to_string()
}

fn default_histogram_buckets() -> Vec<f64> {
    loginsvc_telemetry::MetricsConfig::default().duration_buckets
}

/// Tracing configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TracingConfig {
    /// Export spans over OTLP.
    #[serde(default)]
    pub enabled: bool,

    /// OTLP gRPC endpoint.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,

    /// Share of root traces to sample.
    #[serde(default = "default_sampling_ratio")]
    pub sampling_ratio: f64,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            otlp_endpoint: None,
            sampling_ratio: default_sampling_ratio(),
        }
    }
}

fn default_sampling_ratio() -> f64 {
    1.0
}

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Multi-line human-readable output.
    Pretty,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Install the log subscriber.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Filter directive.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::Json,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Telemetry configuration section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfigSection {
    /// Service name reported in logs, metrics and spans.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Service version, defaults to the crate version.
    #[serde(default)]
    pub service_version: Option<String>,

    /// Deployment environment.
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Metrics settings.
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Span export settings.
    #[serde(default)]
    pub tracing: TracingConfig,

    /// Log settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TelemetryConfigSection {
    /// Converts the section into the telemetry crate's configuration.
    pub fn to_telemetry_config(&self) -> loginsvc_telemetry::TelemetryConfig {
        let mut builder = loginsvc_telemetry::TelemetryConfig::builder()
            .service_name(&self.service_name)
            .environment(&self.environment)
            .metrics(loginsvc_telemetry::MetricsConfig {
                enabled: self.metrics.enabled,
                addr: self.metrics.addr.clone(),
                duration_buckets: self.metrics.histogram_buckets.clone(),
            })
            .logging(loginsvc_telemetry::LogConfig {
                enabled: self.logging.enabled,
                level: self.logging.level.clone(),
                json_format: self.logging.format == LogFormat::Json,
                ..loginsvc_telemetry::LogConfig::default()
            });

        let mut tracing = loginsvc_telemetry::TracingConfig {
            enabled: self.tracing.enabled,
            sample_ratio: self.tracing.sampling_ratio,
            ..loginsvc_telemetry::TracingConfig::default()
        };
        if let Some(endpoint) = &self.tracing.otlp_endpoint {
            tracing.otlp_endpoint.clone_from(endpoint);
        }
        builder = builder.tracing(tracing);

        if let Some(version) = &self.service_version {
            builder = builder.service_version(version);
        }
        builder.build()
    }
}

impl Default for TelemetryConfigSection {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            service_version: None,
            environment: default_environment(),
            metrics: MetricsConfig::default(),
            tracing: TracingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_service_name() -> String {
    "loginsvc".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_true() -> bool {
    true
}
