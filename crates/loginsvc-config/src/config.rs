//! The root configuration type and its builder.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::{
    CircuitBreakerSection, ConfigError, LogFormat, LookupBackend, LookupConfig, RateLimitSection,
    ServerConfig, TelemetryConfigSection,
};

/// Complete loginsvc configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load it from files and the
/// environment.
///
/// # Example
///
/// ```
/// use loginsvc_config::LoginsvcConfig;
///
/// let config = LoginsvcConfig::default();
/// assert_eq!(config.rate_limit.burst, 1);
/// assert_eq!(config.circuit_breaker.consecutive_failures, 6);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct LoginsvcConfig {
    /// Listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Server-side rate limiter.
    #[serde(default)]
    pub rate_limit: RateLimitSection,

    /// Server-side circuit breaker.
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerSection,

    /// In-memory lookup records.
    #[serde(default)]
    pub lookup: LookupConfig,

    /// Telemetry (metrics, tracing, logging).
    #[serde(default)]
    pub telemetry: TelemetryConfigSection,
}

impl LoginsvcConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> LoginsvcConfigBuilder {
        LoginsvcConfigBuilder::new()
    }

    /// Checks values that deserialize fine but cannot be served.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_addr("server.http_addr", &self.server.http_addr)?;
        validate_addr("server.grpc_addr", &self.server.grpc_addr)?;

        if self.server.request_timeout_ms == 0 {
            return Err(ConfigError::invalid_value(
                "server.request_timeout_ms",
                "must be greater than zero",
            ));
        }

        if self.rate_limit.burst == 0 {
            return Err(ConfigError::invalid_value(
                "rate_limit.burst",
                "must be at least 1",
            ));
        }
        if self.rate_limit.refill_interval_ms == 0 {
            return Err(ConfigError::invalid_value(
                "rate_limit.refill_interval_ms",
                "must be greater than zero",
            ));
        }

        if self.circuit_breaker.consecutive_failures == 0 {
            return Err(ConfigError::invalid_value(
                "circuit_breaker.consecutive_failures",
                "must be at least 1",
            ));
        }
        if let Some(ratio) = self.circuit_breaker.failure_ratio {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(ConfigError::invalid_value(
                    "circuit_breaker.failure_ratio",
                    "must be in (0.0, 1.0]",
                ));
            }
        }
        if self.circuit_breaker.half_open_requests == 0 {
            return Err(ConfigError::invalid_value(
                "circuit_breaker.half_open_requests",
                "must be at least 1",
            ));
        }

        if self.lookup.backend == LookupBackend::Sqlite && self.lookup.url.is_none() {
            return Err(ConfigError::validation_error(
                "lookup.url must be set when lookup.backend is sqlite",
            ));
        }

        if self.telemetry.metrics.enabled {
            validate_addr("telemetry.metrics.addr", &self.telemetry.metrics.addr)?;
        }
        if !(0.0..=1.0).contains(&self.telemetry.tracing.sampling_ratio) {
            return Err(ConfigError::invalid_value(
                "telemetry.tracing.sampling_ratio",
                "must be between 0.0 and 1.0",
            ));
        }
        if self.telemetry.tracing.enabled && self.telemetry.tracing.otlp_endpoint.is_none() {
            return Err(ConfigError::validation_error(
                "telemetry.tracing.otlp_endpoint must be set when tracing is enabled",
            ));
        }

        Ok(())
    }

    /// Local development preset: loopback listeners, pretty debug logs.
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.server.http_addr = "127.0.0.1:8081".to_string();
        config.server.grpc_addr = "127.0.0.1:8082".to_string();
        config.telemetry.logging.level = "debug".to_string();
        config.telemetry.logging.format = LogFormat::Pretty;
        config
    }

    /// Production preset: JSON logs, Prometheus listener enabled.
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.telemetry.environment = "production".to_string();
        config.telemetry.logging.format = LogFormat::Json;
        config.telemetry.metrics.enabled = true;
        config
    }
}

fn validate_addr(field: &str, addr: &str) -> Result<(), ConfigError> {
    addr.parse::<SocketAddr>()
        .map(|_| ())
        .map_err(|_| ConfigError::invalid_value(field, format!("invalid socket address: {addr}")))
}

/// Builder for [`LoginsvcConfig`].
#[derive(Debug, Default)]
pub struct LoginsvcConfigBuilder {
    server: Option<ServerConfig>,
    rate_limit: Option<RateLimitSection>,
    circuit_breaker: Option<CircuitBreakerSection>,
    lookup: Option<LookupConfig>,
    telemetry: Option<TelemetryConfigSection>,
}

impl LoginsvcConfigBuilder {
    /// Creates a builder that yields defaults for unset sections.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the server section.
    #[must_use]
    pub fn server(mut self, server: ServerConfig) -> Self {
        self.server = Some(server);
        self
    }

    /// Sets the rate limit section.
    #[must_use]
    pub fn rate_limit(mut self, rate_limit: RateLimitSection) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }

    /// Sets the circuit breaker section.
    #[must_use]
    pub fn circuit_breaker(mut self, circuit_breaker: CircuitBreakerSection) -> Self {
        self.circuit_breaker = Some(circuit_breaker);
        self
    }

    /// Sets the lookup section.
    #[must_use]
    pub fn lookup(mut self, lookup: LookupConfig) -> Self {
        self.lookup = Some(lookup);
        self
    }

    /// Sets the telemetry section.
    #[must_use]
    pub fn telemetry(mut self, telemetry: TelemetryConfigSection) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Builds the configuration without validating it.
    #[must_use]
    pub fn build(self) -> LoginsvcConfig {
        LoginsvcConfig {
            server: self.server.unwrap_or_default(),
            rate_limit: self.rate_limit.unwrap_or_default(),
            circuit_breaker: self.circuit_breaker.unwrap_or_default(),
            lookup: self.lookup.unwrap_or_default(),
            telemetry: self.telemetry.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(LoginsvcConfig::default().validate().is_ok());
        assert!(LoginsvcConfig::development().validate().is_ok());
        assert!(LoginsvcConfig::production().validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = LoginsvcConfig::builder()
            .rate_limit(RateLimitSection {
                burst: 100,
                refill_interval_ms: 1_000,
            })
            .build();

        assert_eq!(config.rate_limit.burst, 100);
        assert_eq!(config.server, ServerConfig::default());
    }

    #[test]
    fn test_invalid_addr() {
        let mut config = LoginsvcConfig::default();
        config.server.grpc_addr = ":8082".to_string();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("server.grpc_addr"));
    }

    #[test]
    fn test_zero_burst_rejected() {
        let mut config = LoginsvcConfig::default();
        config.rate_limit.burst = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "rate_limit.burst"
        ));
    }

    #[test]
    fn test_bad_failure_ratio_rejected() {
        let mut config = LoginsvcConfig::default();
        config.circuit_breaker.failure_ratio = Some(1.5);
        assert!(config.validate().is_err());

        config.circuit_breaker.failure_ratio = Some(0.5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sqlite_backend_requires_url() {
        let mut config = LoginsvcConfig::default();
        config.lookup.backend = LookupBackend::Sqlite;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));

        config.lookup.url = Some("sqlite::memory:".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_tracing_requires_endpoint() {
        let mut config = LoginsvcConfig::default();
        config.telemetry.tracing.enabled = true;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }
}
