//! Local tracer backends.
//!
//! - [`LogTracer`] writes every finished span as one `tracing` event.
//! - [`RecordingTracer`] keeps finished spans in memory for assertions.
//!
//! The OpenTelemetry backend lives in [`crate::tracing`].

use loginsvc_core::{ServiceError, Span, SpanKind, TraceContext, Tracer};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

/// Target of the events written by [`LogTracer`].
pub const SPAN_TARGET: &str = "loginsvc::span";

/// A finished span as seen by a local backend.
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedSpan {
    /// Operation name.
    pub operation: String,
    /// Span kind.
    pub kind: SpanKind,
    /// Parent trace position, if the span was not a root.
    pub parent: Option<TraceContext>,
    /// The span's own trace position.
    pub context: TraceContext,
    /// Annotations in the order they were added.
    pub annotations: Vec<(&'static str, String)>,
    /// Error message, when the span was marked failed.
    pub error: Option<String>,
    /// Wall-clock start time.
    pub started_at: SystemTime,
    /// Time between start and finish.
    pub duration: Duration,
}

impl FinishedSpan {
    /// Returns the value of the first annotation named `key`.
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns true if the span was marked failed.
    pub const fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Span state shared by the local backends.
struct LocalSpan<F: FnOnce(FinishedSpan) + Send> {
    operation: String,
    kind: SpanKind,
    parent: Option<TraceContext>,
    context: TraceContext,
    annotations: Vec<(&'static str, String)>,
    error: Option<String>,
    started_at: SystemTime,
    start: Instant,
    on_finish: F,
}

impl<F: FnOnce(FinishedSpan) + Send> LocalSpan<F> {
    fn start(operation: &str, kind: SpanKind, parent: Option<&TraceContext>, on_finish: F) -> Self {
        Self {
            operation: operation.to_string(),
            kind,
            parent: parent.cloned(),
            context: parent.map_or_else(TraceContext::new_root, TraceContext::child),
            annotations: Vec::new(),
            error: None,
            started_at: SystemTime::now(),
            start: Instant::now(),
            on_finish,
        }
    }
}

impl<F: FnOnce(FinishedSpan) + Send> Span for LocalSpan<F> {
    fn context(&self) -> &TraceContext {
        &self.context
    }

    fn annotate(&mut self, key: &'static str, value: String) {
        self.annotations.push((key, value));
    }

    fn record_error(&mut self, error: &ServiceError) {
        self.error = Some(error.to_string());
    }

    fn finish(self: Box<Self>) {
        let span = *self;
        (span.on_finish)(FinishedSpan {
            operation: span.operation,
            kind: span.kind,
            parent: span.parent,
            context: span.context,
            annotations: span.annotations,
            error: span.error,
            started_at: span.started_at,
            duration: span.start.elapsed(),
        });
    }
}

/// A tracer that logs each finished span.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTracer;

impl Tracer for LogTracer {
    fn start_span(
        &self,
        operation: &str,
        kind: SpanKind,
        parent: Option<&TraceContext>,
    ) -> Box<dyn Span> {
        Box::new(LocalSpan::start(operation, kind, parent, log_span))
    }
}

fn log_span(span: FinishedSpan) {
    let parent_span_id = span
        .parent
        .as_ref()
        .map(|p| p.span_id.as_str())
        .unwrap_or_default();
    let annotations = span
        .annotations
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(" ");
    let duration_ms = span.duration.as_secs_f64() * 1000.0;

    match &span.error {
        Some(error) => tracing::warn!(
            target: SPAN_TARGET,
            operation = %span.operation,
            kind = span.kind.as_str(),
            trace_id = %span.context.trace_id,
            span_id = %span.context.span_id,
            parent_span_id,
            duration_ms,
            annotations = %annotations,
            error = %error,
            "span finished"
        ),
        None => tracing::debug!(
            target: SPAN_TARGET,
            operation = %span.operation,
            kind = span.kind.as_str(),
            trace_id = %span.context.trace_id,
            span_id = %span.context.span_id,
            parent_span_id,
            duration_ms,
            annotations = %annotations,
            "span finished"
        ),
    }
}

/// A tracer that keeps finished spans in memory.
///
/// Clones share the same buffer, so a test can hand one clone to a pipeline
/// and inspect spans through another.
#[derive(Debug, Clone, Default)]
pub struct RecordingTracer {
    finished: Arc<Mutex<Vec<FinishedSpan>>>,
}

impl RecordingTracer {
    /// Creates an empty recording tracer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the finished spans, oldest first.
    pub fn finished(&self) -> Vec<FinishedSpan> {
        self.finished.lock().clone()
    }

    /// Returns the finished spans belonging to `trace_id`.
    pub fn trace(&self, trace_id: &str) -> Vec<FinishedSpan> {
        self.finished
            .lock()
            .iter()
            .filter(|span| span.context.trace_id == trace_id)
            .cloned()
            .collect()
    }

    /// Discards all recorded spans.
    pub fn clear(&self) {
        self.finished.lock().clear();
    }
}

impl Tracer for RecordingTracer {
    fn start_span(
        &self,
        operation: &str,
        kind: SpanKind,
        parent: Option<&TraceContext>,
    ) -> Box<dyn Span> {
        let sink = Arc::clone(&self.finished);
        Box::new(LocalSpan::start(operation, kind, parent, move |span| {
            sink.lock().push(span);
        }))
    }
}
