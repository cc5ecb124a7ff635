//! Pipeline stage implementations.
//!
//! Each stage is one [`Middleware`](crate::Middleware) generic over the
//! request and response types. Stages that react to failures require the
//! response to implement [`Outcome`](loginsvc_core::Outcome).

pub mod circuit_breaker;
pub mod instrumentation;
pub mod logging;
pub mod rate_limit;
pub mod tracing;

pub use circuit_breaker::{
    BreakerCounts, BreakerSettings, BreakerState, CircuitBreaker, CircuitBreakerBuilder,
    StateChangeHook,
};
pub use instrumentation::{DurationHistograms, InstrumentationMiddleware};
pub use logging::LoggingMiddleware;
pub use rate_limit::{RateLimitBuilder, RateLimitConfig, RateLimiter};
pub use tracing::TracingMiddleware;
