//! Metrics instrumentation middleware.
//!
//! Counts successful calls and, when enabled, records the duration of every
//! call that reaches this stage.
//!
//! # Metrics Emitted
//!
//! - `loginsvc_requests_succeeded_total{method}` - Counter of successful calls
//! - `loginsvc_request_duration_seconds{method,success}` - Histogram of call
//!   latency

use crate::middleware::{Middleware, Next};
use loginsvc_core::{BoxFuture, CallContext, Outcome, ServiceResult};
use metrics::{Counter, Histogram};
use tokio::time::Instant;

/// Counter of successful calls.
pub const REQUESTS_SUCCEEDED_TOTAL: &str = "loginsvc_requests_succeeded_total";

/// Histogram of call durations in seconds.
pub const REQUEST_DURATION_SECONDS: &str = "loginsvc_request_duration_seconds";

/// Duration histograms split by outcome.
#[derive(Clone)]
pub struct DurationHistograms {
    /// Durations of successful calls.
    pub success: Histogram,
    /// Durations of failed calls.
    pub failure: Histogram,
}

impl DurationHistograms {
    /// Registers the histograms for `method` with the global recorder.
    pub fn register(method: &str) -> Self {
        let method = method.to_string();
        Self {
            success: metrics::histogram!(
                REQUEST_DURATION_SECONDS,
                "method" => method.clone(),
                "success" => "true"
            ),
            failure: metrics::histogram!(
                REQUEST_DURATION_SECONDS,
                "method" => method,
                "success" => "false"
            ),
        }
    }
}

/// Middleware that counts successes and records durations.
#[derive(Clone)]
pub struct InstrumentationMiddleware {
    succeeded: Counter,
    durations: Option<DurationHistograms>,
}

impl InstrumentationMiddleware {
    /// Creates the middleware with its counter registered for `method` with
    /// the global recorder.
    pub fn new(method: &str) -> Self {
        Self::with_counter(metrics::counter!(
            REQUESTS_SUCCEEDED_TOTAL,
            "method" => method.to_string()
        ))
    }

    /// Creates the middleware around an existing counter.
    #[must_use]
    pub fn with_counter(succeeded: Counter) -> Self {
        Self {
            succeeded,
            durations: None,
        }
    }

    /// Also records call durations.
    #[must_use]
    pub fn durations(mut self, durations: DurationHistograms) -> Self {
        self.durations = Some(durations);
        self
    }
}

impl std::fmt::Debug for InstrumentationMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstrumentationMiddleware")
            .field("durations", &self.durations.is_some())
            .finish_non_exhaustive()
    }
}

impl<Req, Resp> Middleware<Req, Resp> for InstrumentationMiddleware
where
    Req: Send + 'static,
    Resp: Outcome + Send + 'static,
{
    fn name(&self) -> &'static str {
        "instrumentation"
    }

    fn process<'a>(
        &'a self,
        ctx: CallContext,
        request: Req,
        next: Next<'a, Req, Resp>,
    ) -> BoxFuture<'a, ServiceResult<Resp>> {
        Box::pin(async move {
            let start = Instant::now();
            let result = next.run(ctx, request).await;
            let success = result.failure().is_none();

            if success {
                self.succeeded.increment(1);
            }
            if let Some(durations) = &self.durations {
                let histogram = if success {
                    &durations.success
                } else {
                    &durations.failure
                };
                histogram.record(start.elapsed().as_secs_f64());
            }
            result
        })
    }
}
