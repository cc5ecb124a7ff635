//! Abstract distributed tracing interface.
//!
//! The middleware pipeline only depends on [`Tracer`] and [`Span`]. Concrete
//! backends (log-backed, in-memory recording, OpenTelemetry) live in
//! `loginsvc-telemetry`; [`NoopTracer`] is provided here so a pipeline can
//! be built without any backend at all.

use crate::context::TraceContext;
use crate::error::ServiceError;

/// Which side of a call a span represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpanKind {
    /// Handling an inbound call.
    Server,
    /// Making an outbound call.
    Client,
    /// Work inside a process.
    Internal,
}

impl SpanKind {
    /// Returns the lowercase kind name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::Client => "client",
            Self::Internal => "internal",
        }
    }
}

/// A started span.
///
/// A span is finished exactly once by consuming it with [`Span::finish`].
pub trait Span: Send {
    /// Returns the trace position of this span, used for propagation.
    fn context(&self) -> &TraceContext;

    /// Attaches a key/value annotation.
    fn annotate(&mut self, key: &'static str, value: String);

    /// Marks the span as failed with the given error.
    fn record_error(&mut self, error: &ServiceError);

    /// Ends the span and hands it to the backend for export.
    fn finish(self: Box<Self>);
}

/// A tracing backend.
pub trait Tracer: Send + Sync + 'static {
    /// Starts a span, parented to `parent` when it is given.
    fn start_span(
        &self,
        operation: &str,
        kind: SpanKind,
        parent: Option<&TraceContext>,
    ) -> Box<dyn Span>;
}

/// A tracer that records nothing but still propagates trace context.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl Tracer for NoopTracer {
    fn start_span(
        &self,
        _operation: &str,
        _kind: SpanKind,
        parent: Option<&TraceContext>,
    ) -> Box<dyn Span> {
        let context = parent.map_or_else(TraceContext::new_root, TraceContext::child);
        Box::new(NoopSpan { context })
    }
}

struct NoopSpan {
    context: TraceContext,
}

impl Span for NoopSpan {
    fn context(&self) -> &TraceContext {
        &self.context
    }

    fn annotate(&mut self, _key: &'static str, _value: String) {}

    fn record_error(&mut self, _error: &ServiceError) {}

    fn finish(self: Box<Self>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_root_span() {
        let span = NoopTracer.start_span("Name", SpanKind::Server, None);
        assert_eq!(span.context().trace_id.len(), 32);
        span.finish();
    }

    #[test]
    fn test_noop_child_span_keeps_trace() {
        let parent = TraceContext::new_root();
        let mut span = NoopTracer.start_span("Name", SpanKind::Client, Some(&parent));
        span.annotate("name", "ed".to_string());
        span.record_error(&ServiceError::RateLimited);
        assert_eq!(span.context().trace_id, parent.trace_id);
        assert_ne!(span.context().span_id, parent.span_id);
        span.finish();
    }

    #[test]
    fn test_span_kind_names() {
        assert_eq!(SpanKind::Server.as_str(), "server");
        assert_eq!(SpanKind::Client.as_str(), "client");
    }
}
