//! OpenTelemetry distributed tracing.
//!
//! [`init_tracing`] builds an OTLP batch exporter and installs it as the
//! global tracer provider. [`OtelTracer`] adapts the global OpenTelemetry
//! tracer to the [`Tracer`] interface the middleware depends on.
//!
//! Trace positions cross process boundaries as W3C `traceparent` values in
//! both directions: the inbound [`TraceContext`] becomes a remote parent
//! span context, and the started span's ids are rendered back into a
//! [`TraceContext`] for injection.
//!
//! # Example
//!
//! ```rust,ignore
//! use loginsvc_telemetry::tracing::{init_tracing, OtelTracer, TracingConfig};
//!
//! let provider = init_tracing(&TracingConfig::default())?;
//! let tracer = OtelTracer::new("loginsvc");
//! ```

use crate::error::TelemetryError;
use crate::TelemetryResult;
use loginsvc_core::{ServiceError, Span, SpanKind, TraceContext, TraceFlags, Tracer};
use opentelemetry::global::{self, BoxedSpan, BoxedTracer};
use opentelemetry::trace::{
    self as otel, Span as _, SpanContext, SpanId, Status, TraceContextExt, TraceId, TraceState,
    Tracer as _,
};
use opentelemetry::{Context, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler, TracerProvider};
use opentelemetry_sdk::Resource;

/// Tracing configuration.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Whether OTLP export is enabled.
    pub enabled: bool,

    /// OTLP gRPC endpoint (e.g., `http://localhost:4317`).
    pub otlp_endpoint: String,

    /// Service name for the resource.
    pub service_name: String,

    /// Service version for the resource.
    pub service_version: String,

    /// Deployment environment.
    pub environment: String,

    /// Sampling ratio (0.0 to 1.0).
    pub sample_ratio: f64,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            otlp_endpoint: "http://localhost:4317".to_string(),
            service_name: crate::config::DEFAULT_SERVICE_NAME.to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "development".to_string(),
            sample_ratio: 1.0,
        }
    }
}

/// Builds the OTLP pipeline and installs it as the global tracer provider.
///
/// Returns `None` when export is disabled. Must be called from within a
/// Tokio runtime.
pub fn init_tracing(config: &TracingConfig) -> TelemetryResult<Option<TracerProvider>> {
    if !config.enabled {
        return Ok(None);
    }

    let resource = Resource::new([
        KeyValue::new(
            opentelemetry_semantic_conventions::attribute::SERVICE_NAME,
            config.service_name.clone(),
        ),
        KeyValue::new(
            opentelemetry_semantic_conventions::attribute::SERVICE_VERSION,
            config.service_version.clone(),
        ),
        KeyValue::new("deployment.environment", config.environment.clone()),
    ]);

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&config.otlp_endpoint)
        .build()
        .map_err(|e| TelemetryError::TracingInit(e.to_string()))?;

    let sampler = if config.sample_ratio >= 1.0 {
        Sampler::AlwaysOn
    } else if config.sample_ratio <= 0.0 {
        Sampler::AlwaysOff
    } else {
        Sampler::TraceIdRatioBased(config.sample_ratio)
    };

    let provider = TracerProvider::builder()
        .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
        .with_sampler(Sampler::ParentBased(Box::new(sampler)))
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource)
        .build();

    global::set_tracer_provider(provider.clone());
    tracing::info!(endpoint = %config.otlp_endpoint, "otlp span export enabled");

    Ok(Some(provider))
}

/// A [`Tracer`] backed by the global OpenTelemetry tracer.
///
/// Non-recording spans (no installed provider, or dropped by the sampler)
/// echo their parent's ids or carry none; trace positions are then derived
/// locally so that propagation keeps working.
pub struct OtelTracer {
    tracer: BoxedTracer,
}

impl OtelTracer {
    /// Creates a tracer with the given instrumentation scope name.
    pub fn new(scope: &'static str) -> Self {
        Self {
            tracer: global::tracer(scope),
        }
    }
}

impl std::fmt::Debug for OtelTracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OtelTracer").finish_non_exhaustive()
    }
}

impl Tracer for OtelTracer {
    fn start_span(
        &self,
        operation: &str,
        kind: SpanKind,
        parent: Option<&TraceContext>,
    ) -> Box<dyn Span> {
        let parent_cx = parent
            .and_then(remote_span_context)
            .map_or_else(Context::new, |sc| Context::new().with_remote_span_context(sc));

        let mut inner = self
            .tracer
            .span_builder(operation.to_string())
            .with_kind(otel_kind(kind))
            .start_with_context(&self.tracer, &parent_cx);
        inner.set_attribute(KeyValue::new("rpc.method", operation.to_string()));

        let span_context = inner.span_context();
        let context = if inner.is_recording() && span_context.is_valid() {
            TraceContext {
                trace_id: span_context.trace_id().to_string(),
                span_id: span_context.span_id().to_string(),
                flags: TraceFlags::new(span_context.trace_flags().to_u8()),
            }
        } else {
            parent.map_or_else(TraceContext::new_root, TraceContext::child)
        };

        Box::new(OtelSpan { inner, context })
    }
}

struct OtelSpan {
    inner: BoxedSpan,
    context: TraceContext,
}

impl Span for OtelSpan {
    fn context(&self) -> &TraceContext {
        &self.context
    }

    fn annotate(&mut self, key: &'static str, value: String) {
        self.inner.set_attribute(KeyValue::new(key, value));
    }

    fn record_error(&mut self, error: &ServiceError) {
        self.inner.record_error(error);
        self.inner.set_attribute(KeyValue::new("error.category", error.category().as_str()));
        self.inner.set_status(Status::error(error.to_string()));
    }

    fn finish(mut self: Box<Self>) {
        self.inner.end();
    }
}

fn remote_span_context(parent: &TraceContext) -> Option<SpanContext> {
    let trace_id = TraceId::from_hex(&parent.trace_id).ok()?;
    let span_id = SpanId::from_hex(&parent.span_id).ok()?;
    Some(SpanContext::new(
        trace_id,
        span_id,
        otel::TraceFlags::new(parent.flags.bits()),
        true,
        TraceState::default(),
    ))
}

const fn otel_kind(kind: SpanKind) -> otel::SpanKind {
    match kind {
        SpanKind::Server => otel::SpanKind::Server,
        SpanKind::Client => otel::SpanKind::Client,
        SpanKind::Internal => otel::SpanKind::Internal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TracingConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.sample_ratio, 1.0);
        assert_eq!(config.service_name, "loginsvc");
    }

    #[test]
    fn test_disabled_tracing() {
        let provider = init_tracing(&TracingConfig::default()).unwrap();
        assert!(provider.is_none());
    }

    #[test]
    fn test_remote_span_context_from_traceparent() {
        let parent =
            TraceContext::parse("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01").unwrap();
        let sc = remote_span_context(&parent).unwrap();
        assert!(sc.is_valid());
        assert!(sc.is_remote());
        assert_eq!(sc.trace_id().to_string(), parent.trace_id);
        assert_eq!(sc.span_id().to_string(), parent.span_id);
        assert!(sc.trace_flags().is_sampled());
    }

    #[test]
    fn test_span_without_provider_still_propagates() {
        let tracer = OtelTracer::new("loginsvc-test");
        let parent = TraceContext::new_root();

        let mut span = tracer.start_span("Name", SpanKind::Client, Some(&parent));
        span.annotate("request_id", "r-1".to_string());
        span.record_error(&ServiceError::RateLimited);

        assert_eq!(span.context().trace_id, parent.trace_id);
        assert_ne!(span.context().span_id, parent.span_id);
        span.finish();
    }

    #[test]
    fn test_root_span_without_provider() {
        let span = OtelTracer::new("loginsvc-test").start_span("Name", SpanKind::Server, None);
        assert_eq!(span.context().trace_id.len(), 32);
        assert_eq!(span.context().span_id.len(), 16);
        span.finish();
    }
}
