//! Tracing middleware.
//!
//! Starts one span per call through the injected [`Tracer`], parented to the
//! trace position already in the [`CallContext`] (set by the transport adapter
//! from an inbound `traceparent`, or by the caller). The span's own position
//! replaces it in the context passed inward, so a client endpoint further in
//! injects this span as the parent of the remote server span.
//!
//! ## Span Annotations
//!
//! - `request_id` - The call's request ID
//! - `outcome` - `success` or `error` (added on completion), or `cancelled`
//!   when the call future is dropped before the inner call returns
//! - the error itself via [`Span::record_error`] on failure

use crate::middleware::{Middleware, Next};
use loginsvc_core::{
    BoxFuture, CallContext, NoopTracer, Outcome, ServiceResult, Span, SpanKind, Tracer,
};
use std::sync::Arc;

/// Middleware that wraps each call in a span.
#[derive(Clone)]
pub struct TracingMiddleware {
    tracer: Arc<dyn Tracer>,
    operation: String,
    kind: SpanKind,
}

impl TracingMiddleware {
    /// Creates a tracing middleware.
    pub fn new(tracer: Arc<dyn Tracer>, operation: impl Into<String>, kind: SpanKind) -> Self {
        Self {
            tracer,
            operation: operation.into(),
            kind,
        }
    }

    /// Creates a middleware producing server spans.
    pub fn server(tracer: Arc<dyn Tracer>, operation: impl Into<String>) -> Self {
        Self::new(tracer, operation, SpanKind::Server)
    }

    /// Creates a middleware producing client spans.
    pub fn client(tracer: Arc<dyn Tracer>, operation: impl Into<String>) -> Self {
        Self::new(tracer, operation, SpanKind::Client)
    }

    /// Returns the span operation name.
    #[must_use]
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Returns the span kind.
    #[must_use]
    pub const fn kind(&self) -> SpanKind {
        self.kind
    }
}

impl Default for TracingMiddleware {
    fn default() -> Self {
        Self::server(Arc::new(NoopTracer), "unknown")
    }
}

impl std::fmt::Debug for TracingMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TracingMiddleware")
            .field("operation", &self.operation)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl<Req, Resp> Middleware<Req, Resp> for TracingMiddleware
where
    Req: Send + 'static,
    Resp: Outcome + Send + 'static,
{
    fn name(&self) -> &'static str {
        "tracing"
    }

    fn process<'a>(
        &'a self,
        ctx: CallContext,
        request: Req,
        next: Next<'a, Req, Resp>,
    ) -> BoxFuture<'a, ServiceResult<Resp>> {
        let mut span: Box<dyn Span> = self.tracer.start_span(&self.operation, self.kind, ctx.trace());
        span.annotate("request_id", ctx.request_id().to_string());
        let inner = ctx.with_trace(span.context().clone());

        let mut guard = SpanGuard(Some(span));

        Box::pin(async move {
            let result = next.run(inner, request).await;

            if let Some(mut span) = guard.0.take() {
                match result.failure() {
                    Some(error) => {
                        span.annotate("outcome", "error".to_string());
                        span.record_error(error);
                    }
                    None => span.annotate("outcome", "success".to_string()),
                }
                span.finish();
            }
            result
        })
    }
}

/// Finishes the span as `cancelled` if the call is dropped mid-flight.
struct SpanGuard(Option<Box<dyn Span>>);

impl Drop for SpanGuard {
    fn drop(&mut self) {
        if let Some(mut span) = self.0.take() {
            span.annotate("outcome", "cancelled".to_string());
            span.finish();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loginsvc_core::{Endpoint, NameResponse, ServiceError, TraceContext};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Collector {
        finished: Mutex<Vec<(String, Option<TraceContext>, TraceContext, Vec<(String, String)>)>>,
    }

    struct TestTracer(Arc<Collector>);

    struct TestSpan {
        collector: Arc<Collector>,
        operation: String,
        parent: Option<TraceContext>,
        context: TraceContext,
        annotations: Vec<(String, String)>,
    }

    impl Tracer for TestTracer {
        fn start_span(
            &self,
            operation: &str,
            _kind: SpanKind,
            parent: Option<&TraceContext>,
        ) -> Box<dyn Span> {
            Box::new(TestSpan {
                collector: self.0.clone(),
                operation: operation.to_string(),
                parent: parent.cloned(),
                context: parent.map_or_else(TraceContext::new_root, TraceContext::child),
                annotations: Vec::new(),
            })
        }
    }

    impl Span for TestSpan {
        fn context(&self) -> &TraceContext {
            &self.context
        }

        fn annotate(&mut self, key: &'static str, value: String) {
            self.annotations.push((key.to_string(), value));
        }

        fn record_error(&mut self, error: &ServiceError) {
            self.annotations.push(("error".to_string(), error.to_string()));
        }

        fn finish(self: Box<Self>) {
            self.collector.finished.lock().push((
                self.operation,
                self.parent,
                self.context,
                self.annotations,
            ));
        }
    }

    /// Echoes the trace id it was called with as the response value.
    struct TraceEcho {
        fail: bool,
    }

    impl Endpoint<(), NameResponse> for TraceEcho {
        fn call(&self, ctx: CallContext, (): ()) -> BoxFuture<'_, ServiceResult<NameResponse>> {
            let span_id = ctx.trace().map(|t| t.span_id.clone()).unwrap_or_default();
            let fail = self.fail;
            Box::pin(async move {
                if fail {
                    Ok(NameResponse::failed(ServiceError::not_found("x")))
                } else {
                    Ok(NameResponse::found(span_id))
                }
            })
        }
    }

    #[tokio::test]
    async fn test_span_context_propagates_inward() {
        let collector = Arc::new(Collector::default());
        let middleware =
            TracingMiddleware::server(Arc::new(TestTracer(collector.clone())), "Name");

        let parent = TraceContext::new_root();
        let ctx = CallContext::new().with_trace(parent.clone());
        let endpoint = TraceEcho { fail: false };
        let response = middleware
            .process(ctx, (), Next::<(), NameResponse>::endpoint(&endpoint))
            .await
            .unwrap();

        let finished = collector.finished.lock();
        assert_eq!(finished.len(), 1);
        let (operation, recorded_parent, context, annotations) = &finished[0];
        assert_eq!(operation, "Name");
        assert_eq!(recorded_parent.as_ref(), Some(&parent));
        assert_eq!(context.trace_id, parent.trace_id);
        assert_eq!(response.value, context.span_id);
        assert!(annotations.contains(&("outcome".to_string(), "success".to_string())));
    }

    #[tokio::test]
    async fn test_business_error_marks_span() {
        let collector = Arc::new(Collector::default());
        let middleware =
            TracingMiddleware::client(Arc::new(TestTracer(collector.clone())), "Name");
        let endpoint = TraceEcho { fail: true };

        let _ = middleware
            .process(
                CallContext::new(),
                (),
                Next::<(), NameResponse>::endpoint(&endpoint),
            )
            .await;

        let finished = collector.finished.lock();
        let (_, parent, _, annotations) = &finished[0];
        assert!(parent.is_none());
        assert!(annotations.contains(&("outcome".to_string(), "error".to_string())));
        assert!(annotations.iter().any(|(k, _)| k == "error"));
    }

    struct Hang;

    impl Endpoint<(), NameResponse> for Hang {
        fn call(&self, _ctx: CallContext, (): ()) -> BoxFuture<'_, ServiceResult<NameResponse>> {
            Box::pin(std::future::pending())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_call_finishes_span_as_cancelled() {
        let collector = Arc::new(Collector::default());
        let middleware =
            TracingMiddleware::server(Arc::new(TestTracer(collector.clone())), "Name");

        let call = middleware.process(
            CallContext::new(),
            (),
            Next::<(), NameResponse>::endpoint(&Hang),
        );
        let timed_out = tokio::time::timeout(std::time::Duration::from_millis(10), call).await;
        assert!(timed_out.is_err());

        let finished = collector.finished.lock();
        assert_eq!(finished.len(), 1);
        let (_, _, _, annotations) = &finished[0];
        assert!(annotations.contains(&("outcome".to_string(), "cancelled".to_string())));
    }
}
