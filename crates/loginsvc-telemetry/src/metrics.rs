//! Prometheus metrics.
//!
//! All metrics go through the `metrics` facade. [`init_metrics`] installs the
//! Prometheus recorder with its own HTTP listener; before that (and in tests)
//! every handle is a no-op.
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Recorded by |
//! |--------|------|--------|-------------|
//! | `loginsvc_requests_succeeded_total` | Counter | `method` | Instrumentation stage |
//! | `loginsvc_request_duration_seconds` | Histogram | `method`, `success` | Instrumentation stage |
//! | `loginsvc_rate_limited_total` | Counter | `method` | Rate limiter |
//! | `loginsvc_breaker_rejected_total` | Counter | `method` | Circuit breaker |
//! | `loginsvc_breaker_state_changes_total` | Counter | `name`, `to` | Circuit breaker hook |

use crate::error::TelemetryError;
use crate::TelemetryResult;
use metrics::{counter, describe_counter, describe_histogram, Counter, Unit};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metric names.
pub mod names {
    /// Successful calls, by method.
    pub const REQUESTS_SUCCEEDED_TOTAL: &str = "loginsvc_requests_succeeded_total";

    /// Call durations in seconds, by method and success.
    pub const REQUEST_DURATION_SECONDS: &str = "loginsvc_request_duration_seconds";

    /// Calls rejected by the rate limiter, by method.
    pub const RATE_LIMITED_TOTAL: &str = "loginsvc_rate_limited_total";

    /// Calls rejected by an open breaker, by method.
    pub const BREAKER_REJECTED_TOTAL: &str = "loginsvc_breaker_rejected_total";

    /// Breaker transitions, by breaker name and target state.
    pub const BREAKER_STATE_CHANGES_TOTAL: &str = "loginsvc_breaker_state_changes_total";
}

/// Metrics configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Whether the Prometheus recorder is installed.
    pub enabled: bool,

    /// Address of the scrape listener (e.g., "0.0.0.0:9090").
    pub addr: String,

    /// Histogram buckets for call durations, in seconds.
    pub duration_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: "0.0.0.0:9090".to_string(),
            duration_buckets: vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ],
        }
    }
}

/// Installs the Prometheus recorder and its scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let addr: SocketAddr = config
        .addr
        .parse()
        .map_err(|e| TelemetryError::InvalidAddress(format!("{}: {e}", config.addr)))?;

    let handle = PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Full(names::REQUEST_DURATION_SECONDS.to_string()),
            &config.duration_buckets,
        )
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?
        .install_recorder()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    let _ = METRICS_HANDLE.set(handle);
    describe_metrics();

    tracing::info!(addr = %addr, "prometheus listener started");
    Ok(())
}

/// Renders the current metrics in Prometheus text format.
///
/// Returns `None` until [`init_metrics`] has installed the recorder.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

/// Registers help text for every standard metric.
pub fn describe_metrics() {
    describe_counter!(
        names::REQUESTS_SUCCEEDED_TOTAL,
        Unit::Count,
        "Calls that returned without error"
    );
    describe_histogram!(
        names::REQUEST_DURATION_SECONDS,
        Unit::Seconds,
        "Duration of calls that reached business logic"
    );
    describe_counter!(
        names::RATE_LIMITED_TOTAL,
        Unit::Count,
        "Calls rejected by the rate limiter"
    );
    describe_counter!(
        names::BREAKER_REJECTED_TOTAL,
        Unit::Count,
        "Calls rejected by an open circuit breaker"
    );
    describe_counter!(
        names::BREAKER_STATE_CHANGES_TOTAL,
        Unit::Count,
        "Circuit breaker state transitions"
    );
}

/// Rejection counter for the rate limiter guarding `method`.
pub fn rate_limited_counter(method: &str) -> Counter {
    counter!(names::RATE_LIMITED_TOTAL, "method" => method.to_string())
}

/// Rejection counter for the breaker guarding `method`.
pub fn breaker_rejected_counter(method: &str) -> Counter {
    counter!(names::BREAKER_REJECTED_TOTAL, "method" => method.to_string())
}

/// Records one breaker transition into state `to`.
pub fn record_breaker_state_change(name: &str, to: &str) {
    counter!(
        names::BREAKER_STATE_CHANGES_TOTAL,
        "name" => name.to_string(),
        "to" => to.to_string()
    )
    .increment(1);
}
