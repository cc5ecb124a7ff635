//! # Loginsvc Middleware
//!
//! Endpoint middleware for loginsvc.
//!
//! A [`Pipeline`] wraps one [`Endpoint`](loginsvc_core::Endpoint) with a
//! fixed-order chain of stages. The same pipeline shape is used on the
//! server, around the resolver, and on the client, around the network call.
//!
//! ## Pipeline Stages
//!
//! ```text
//! call → RateLimit → CircuitBreaker → Tracing → Logging → Instrumentation → Endpoint
//!                                                                              ↓
//! result ← RateLimit ← CircuitBreaker ← Tracing ← Logging ← Instrumentation ←──┘
//! ```
//!
//! | Stage | Middleware | Purpose |
//! |-------|------------|---------|
//! | 1 | [`RateLimiter`] | Token bucket, fails fast with `RateLimited` |
//! | 2 | [`CircuitBreaker`] | Fails fast with `Unavailable` while open |
//! | 3 | [`TracingMiddleware`] | Span per call, context propagated inward |
//! | 4 | [`LoggingMiddleware`] | One structured record per call |
//! | 5 | [`InstrumentationMiddleware`] | Success counter, duration histogram |
//!
//! Stateful stages are built by the caller and moved into the builder; no
//! stage keeps global state.
//!
//! ## Example
//!
//! ```
//! use loginsvc_middleware::pipeline::Stage;
//!
//! let stages = Stage::all();
//! assert_eq!(stages.len(), 5);
//! assert_eq!(stages[0].name(), "rate_limit");
//! assert_eq!(stages[4].name(), "instrumentation");
//! ```

#![doc(html_root_url = "https://docs.rs/loginsvc-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod middleware;
pub mod pipeline;
pub mod stages;

pub use middleware::{Middleware, Next};
pub use pipeline::{BoxedMiddleware, Pipeline, PipelineBuilder, Stage};
pub use stages::{
    BreakerCounts, BreakerSettings, BreakerState, CircuitBreaker, CircuitBreakerBuilder,
    DurationHistograms, InstrumentationMiddleware, LoggingMiddleware, RateLimitBuilder,
    RateLimitConfig, RateLimiter, StateChangeHook, TracingMiddleware,
};
