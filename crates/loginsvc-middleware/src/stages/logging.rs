//! Structured logging middleware.
//!
//! Emits exactly one `info` event per call that reaches this stage, after the
//! inner call returns, or `call cancelled` if the call is dropped first. Calls rejected by the limiter or the breaker never get
//! this far; they show up in the rejection counters instead.
//!
//! ## Fields
//!
//! | Field | Content |
//! |-------|---------|
//! | `method` | Operation name |
//! | `input` | `Debug` rendering of the request |
//! | `output` | `Debug` rendering of the response, empty on endpoint error |
//! | `error` | Error message, empty on success |
//! | `took_ms` | Wall time of the inner call |
//! | `request_id` | The call's request ID |
//! | `trace_id` | Trace ID, empty when untraced |

use crate::middleware::{Middleware, Next};
use loginsvc_core::{BoxFuture, CallContext, Outcome, ServiceResult};
use std::fmt::Debug;
use tokio::time::Instant;

/// Middleware that logs each completed call.
#[derive(Debug, Clone)]
pub struct LoggingMiddleware {
    method: String,
}

impl LoggingMiddleware {
    /// Creates a logging middleware for `method`.
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
        }
    }
}

impl<Req, Resp> Middleware<Req, Resp> for LoggingMiddleware
where
    Req: Debug + Send + 'static,
    Resp: Debug + Outcome + Send + 'static,
{
    fn name(&self) -> &'static str {
        "logging"
    }

    fn process<'a>(
        &'a self,
        ctx: CallContext,
        request: Req,
        next: Next<'a, Req, Resp>,
    ) -> BoxFuture<'a, ServiceResult<Resp>> {
        let mut record = CallRecord {
            method: &self.method,
            input: format!("{request:?}"),
            request_id: ctx.request_id().to_string(),
            trace_id: ctx.trace_id().unwrap_or_default().to_string(),
            start: Instant::now(),
            emitted: false,
        };

        Box::pin(async move {
            let result = next.run(ctx, request).await;

            let output = result
                .as_ref()
                .map(|response| format!("{response:?}"))
                .unwrap_or_default();
            let error = result.failure().map(ToString::to_string).unwrap_or_default();
            record.emit("call completed", &output, &error);
            result
        })
    }
}

/// One call's log record. Emitted as `call cancelled` if the call future is
/// dropped before the inner call returns.
struct CallRecord<'a> {
    method: &'a str,
    input: String,
    request_id: String,
    trace_id: String,
    start: Instant,
    emitted: bool,
}

impl CallRecord<'_> {
    fn emit(&mut self, message: &str, output: &str, error: &str) {
        self.emitted = true;
        let took_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        tracing::info!(
            method = %self.method,
            input = %self.input,
            output = %output,
            error = %error,
            took_ms,
            request_id = %self.request_id,
            trace_id = %self.trace_id,
            "{message}"
        );
    }
}

impl Drop for CallRecord<'_> {
    fn drop(&mut self) {
        if !self.emitted {
            self.emit("call cancelled", "", "cancelled");
        }
    }
}
