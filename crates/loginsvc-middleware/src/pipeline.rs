//! Fixed-order middleware pipeline.
//!
//! The pipeline wraps one endpoint with up to five stages. Stages always run
//! in the same order, outermost first, no matter the order they were handed
//! to the builder:
//!
//! 1. **Rate Limit** - Reject with `RateLimited` when no token is available
//! 2. **Circuit Breaker** - Reject with `Unavailable` while the breaker is open
//! 3. **Tracing** - Start a span and propagate its context inward
//! 4. **Logging** - One structured record per call that reached this far
//! 5. **Instrumentation** - Success counter and duration histogram
//!
//! A built [`Pipeline`] is itself an [`Endpoint`], so the same type serves
//! the server side (around the resolver) and the client side (around a
//! network call).

use crate::middleware::{Middleware, Next};
use crate::stages::{
    CircuitBreaker, InstrumentationMiddleware, LoggingMiddleware, RateLimiter, TracingMiddleware,
};
use loginsvc_core::{BoxEndpoint, BoxFuture, CallContext, Endpoint, ServiceResult};
use std::sync::Arc;

/// A type-erased middleware that can be stored in a vector.
pub type BoxedMiddleware<Req, Resp> = Arc<dyn Middleware<Req, Resp>>;

/// An endpoint decorated with a fixed-order middleware chain.
///
/// # Example
///
/// ```
/// use loginsvc_core::{fixtures, CallContext, Endpoint, NameRequest, ResolveEndpoint, Resolver};
/// use loginsvc_middleware::{LoggingMiddleware, Pipeline, RateLimiter};
///
/// # tokio_test::block_on(async {
/// let pipeline = Pipeline::builder()
///     .logging(LoggingMiddleware::new("name"))
///     .rate_limit(RateLimiter::builder().burst(10).build())
///     .build(ResolveEndpoint::new(Resolver::new(fixtures::sample_lookup())));
///
/// assert_eq!(pipeline.stage_names(), vec!["rate_limit", "logging"]);
///
/// let response = pipeline
///     .call(CallContext::new(), NameRequest::new("ed"))
///     .await
///     .unwrap();
/// assert_eq!(response.value, "a123456789");
/// # });
/// ```
pub struct Pipeline<Req, Resp> {
    stages: Vec<BoxedMiddleware<Req, Resp>>,
    endpoint: BoxEndpoint<Req, Resp>,
}

impl<Req, Resp> Pipeline<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn builder() -> PipelineBuilder<Req, Resp> {
        PipelineBuilder::new()
    }

    fn build_chain(&self) -> Next<'_, Req, Resp> {
        let mut next = Next::endpoint(self.endpoint.as_ref());
        for middleware in self.stages.iter().rev() {
            next = Next::new(middleware.as_ref(), next);
        }
        next
    }

    /// Returns the names of all middleware stages in order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Returns the number of middleware stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}

impl<Req, Resp> Endpoint<Req, Resp> for Pipeline<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    fn call(&self, ctx: CallContext, request: Req) -> BoxFuture<'_, ServiceResult<Resp>> {
        self.build_chain().run(ctx, request)
    }
}

impl<Req: 'static, Resp: 'static> std::fmt::Debug for Pipeline<Req, Resp> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.stages.iter().map(|stage| stage.name()).collect();
        f.debug_struct("Pipeline").field("stages", &names).finish_non_exhaustive()
    }
}

/// Builder for constructing a [`Pipeline`].
///
/// Each stage can be set at most once; setting it again replaces it.
/// Stateful stages (the limiter and the breaker) are constructed by the
/// caller and moved in, so their state lives exactly as long as the pipeline
/// and its clones.
pub struct PipelineBuilder<Req, Resp> {
    stages: Vec<(Stage, BoxedMiddleware<Req, Resp>)>,
}

impl<Req, Resp> PipelineBuilder<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    fn stage<M: Middleware<Req, Resp>>(mut self, stage: Stage, middleware: M) -> Self {
        self.stages.retain(|(existing, _)| *existing != stage);
        self.stages.push((stage, Arc::new(middleware)));
        self
    }

    /// Sets the rate limiting stage.
    #[must_use]
    pub fn rate_limit(self, limiter: RateLimiter) -> Self
    where
        RateLimiter: Middleware<Req, Resp>,
    {
        self.stage(Stage::RateLimit, limiter)
    }

    /// Sets the circuit breaker stage.
    #[must_use]
    pub fn circuit_breaker(self, breaker: CircuitBreaker) -> Self
    where
        CircuitBreaker: Middleware<Req, Resp>,
    {
        self.stage(Stage::CircuitBreaker, breaker)
    }

    /// Sets the tracing stage.
    #[must_use]
    pub fn tracing(self, tracing: TracingMiddleware) -> Self
    where
        TracingMiddleware: Middleware<Req, Resp>,
    {
        self.stage(Stage::Tracing, tracing)
    }

    /// Sets the logging stage.
    #[must_use]
    pub fn logging(self, logging: LoggingMiddleware) -> Self
    where
        LoggingMiddleware: Middleware<Req, Resp>,
    {
        self.stage(Stage::Logging, logging)
    }

    /// Sets the instrumentation stage.
    #[must_use]
    pub fn instrumentation(self, instrumentation: InstrumentationMiddleware) -> Self
    where
        InstrumentationMiddleware: Middleware<Req, Resp>,
    {
        self.stage(Stage::Instrumentation, instrumentation)
    }

    /// Builds the pipeline around `endpoint`.
    #[must_use]
    pub fn build<E: Endpoint<Req, Resp>>(mut self, endpoint: E) -> Pipeline<Req, Resp> {
        self.stages.sort_by_key(|(stage, _)| *stage);
        Pipeline {
            stages: self.stages.into_iter().map(|(_, m)| m).collect(),
            endpoint: Arc::new(endpoint),
        }
    }
}

impl<Req, Resp> Default for PipelineBuilder<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Pipeline stage marker for ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Stage {
    /// Stage 1: Token bucket rate limiting
    RateLimit = 1,
    /// Stage 2: Circuit breaking
    CircuitBreaker = 2,
    /// Stage 3: Distributed tracing span
    Tracing = 3,
    /// Stage 4: Structured logging
    Logging = 4,
    /// Stage 5: Metrics instrumentation
    Instrumentation = 5,
}

impl Stage {
    /// Returns the stage name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::RateLimit => "rate_limit",
            Self::CircuitBreaker => "circuit_breaker",
            Self::Tracing => "tracing",
            Self::Logging => "logging",
            Self::Instrumentation => "instrumentation",
        }
    }

    /// Returns all stages in order.
    #[must_use]
    pub const fn all() -> [Stage; 5] {
        [
            Self::RateLimit,
            Self::CircuitBreaker,
            Self::Tracing,
            Self::Logging,
            Self::Instrumentation,
        ]
    }
}
