//! Client stubs: a network endpoint behind the client-side pipeline.
//!
//! Each stub gets its own limiter and breaker. They guard the caller, not
//! the server, and are unrelated to the server-side instances.
//!
//! ```text
//! resolve() → RateLimit → CircuitBreaker → Tracing(client) → network call
//! ```

use std::sync::Arc;
use std::time::Duration;

use loginsvc_core::{Endpoint, EndpointService, NameRequest, NameResponse, NoopTracer, Tracer};
use loginsvc_middleware::{
    BreakerSettings, CircuitBreaker, Pipeline, RateLimitConfig, RateLimiter, TracingMiddleware,
};
use loginsvc_telemetry::metrics::{breaker_rejected_counter, rate_limited_counter};

use crate::error::ClientError;
use crate::grpc::{GrpcNameEndpoint, DEFAULT_DIAL_TIMEOUT};
use crate::http::HttpNameEndpoint;

/// Operation name used for the client span and breaker.
pub const OPERATION: &str = "Name";

/// Metrics label for client-side rejections.
const CLIENT_METHOD: &str = "client_name";

/// A transport-transparent client for the `Name` operation.
pub type NameClient = EndpointService<Pipeline<NameRequest, NameResponse>>;

/// Which transport a client talks over, and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// HTTP+JSON at a `host:port` or base URL.
    Http(String),
    /// gRPC at a `host:port` or URI.
    Grpc(String),
}

/// Client-side pipeline settings.
#[derive(Clone)]
pub struct ClientConfig {
    /// Client limiter. Default: burst 100, one token per second.
    pub rate_limit: RateLimitConfig,
    /// Client breaker. Default: named `Name`, 30 second open timeout.
    pub breaker: BreakerSettings,
    /// gRPC dial timeout. Default: 1 second.
    pub dial_timeout: Duration,
    /// Tracer for client spans.
    pub tracer: Arc<dyn Tracer>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let mut breaker = BreakerSettings::new(OPERATION);
        breaker.open_timeout = Duration::from_secs(30);

        Self {
            rate_limit: RateLimitConfig {
                burst: 100,
                refill_interval: Duration::from_secs(1),
            },
            breaker,
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            tracer: Arc::new(NoopTracer),
        }
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("rate_limit", &self.rate_limit)
            .field("breaker", &self.breaker)
            .field("dial_timeout", &self.dial_timeout)
            .finish_non_exhaustive()
    }
}

impl ClientConfig {
    /// Uses `tracer` for client spans.
    #[must_use]
    pub fn tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = tracer;
        self
    }
}

/// Wraps a network endpoint in the client pipeline.
pub fn client_pipeline<E>(network: E, config: &ClientConfig) -> Pipeline<NameRequest, NameResponse>
where
    E: Endpoint<NameRequest, NameResponse>,
{
    let limiter = RateLimiter::builder()
        .config(config.rate_limit)
        .rejections(rate_limited_counter(CLIENT_METHOD))
        .build();
    let breaker = CircuitBreaker::builder(config.breaker.name.clone())
        .settings(config.breaker.clone())
        .rejections(breaker_rejected_counter(CLIENT_METHOD))
        .build();

    Pipeline::builder()
        .rate_limit(limiter)
        .circuit_breaker(breaker)
        .tracing(TracingMiddleware::client(Arc::clone(&config.tracer), OPERATION))
        .build(network)
}

/// Builds an HTTP client for `instance`.
pub fn http_client(instance: &str, config: &ClientConfig) -> Result<NameClient, ClientError> {
    let network = HttpNameEndpoint::new(instance)?;
    Ok(EndpointService::new(client_pipeline(network, config)))
}

/// Dials `addr` and builds a gRPC client.
pub async fn grpc_client(addr: &str, config: &ClientConfig) -> Result<NameClient, ClientError> {
    let network = GrpcNameEndpoint::connect_with_timeout(addr, config.dial_timeout).await?;
    Ok(EndpointService::new(client_pipeline(network, config)))
}

/// Builds a client for `target`.
pub async fn connect(target: &Target, config: &ClientConfig) -> Result<NameClient, ClientError> {
    match target {
        Target::Http(instance) => http_client(instance, config),
        Target::Grpc(addr) => grpc_client(addr, config).await,
    }
}
