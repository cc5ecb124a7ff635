//! Server-side pipeline construction.

use std::sync::Arc;

use loginsvc_config::LoginsvcConfig;
use loginsvc_core::{
    BoxEndpoint, Lookup, NameRequest, NameResponse, ResolveEndpoint, Resolver, Tracer,
};
use loginsvc_middleware::{
    CircuitBreaker, DurationHistograms, InstrumentationMiddleware, LoggingMiddleware, Pipeline,
    RateLimiter, TracingMiddleware,
};
use loginsvc_telemetry::metrics::{
    breaker_rejected_counter, rate_limited_counter, record_breaker_state_change,
};

/// Method label used in logs and metrics.
pub const METHOD: &str = "name";

/// Operation name used for spans and the breaker.
pub const OPERATION: &str = "Name";

/// The decorated endpoint both transports share.
pub type NamePipeline = Pipeline<NameRequest, NameResponse>;

/// A shared handle to the decorated endpoint.
pub type SharedEndpoint = BoxEndpoint<NameRequest, NameResponse>;

/// Builds the server pipeline around a resolver backed by `lookup`.
///
/// The limiter and breaker are created here, once, and live as long as the
/// returned pipeline.
pub fn server_pipeline(
    config: &LoginsvcConfig,
    lookup: Arc<dyn Lookup>,
    tracer: Arc<dyn Tracer>,
) -> NamePipeline {
    let limiter = RateLimiter::builder()
        .config(config.rate_limit.to_config())
        .rejections(rate_limited_counter(METHOD))
        .build();

    let breaker = CircuitBreaker::builder(OPERATION)
        .settings(config.circuit_breaker.to_settings(OPERATION))
        .rejections(breaker_rejected_counter(METHOD))
        // The breaker logs its own transitions.
        .on_state_change(|name, _from, to| record_breaker_state_change(name, to.as_str()))
        .build();

    Pipeline::builder()
        .rate_limit(limiter)
        .circuit_breaker(breaker)
        .tracing(TracingMiddleware::server(tracer, OPERATION))
        .logging(LoggingMiddleware::new(METHOD))
        .instrumentation(
            InstrumentationMiddleware::new(METHOD).durations(DurationHistograms::register(METHOD)),
        )
        .build(ResolveEndpoint::new(Resolver::from_shared(lookup)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::Mutex;
    use std::time::Duration;

    use loginsvc_core::{fixtures, CallContext, Endpoint, NoopTracer, ServiceError};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_all_stages_present() {
        let pipeline = server_pipeline(
            &LoginsvcConfig::default(),
            Arc::new(fixtures::sample_lookup()),
            Arc::new(NoopTracer),
        );
        assert_eq!(
            pipeline.stage_names(),
            vec!["rate_limit", "circuit_breaker", "tracing", "logging", "instrumentation"]
        );
    }

    #[tokio::test]
    async fn test_default_limiter_allows_one_call() {
        let pipeline = server_pipeline(
            &LoginsvcConfig::default(),
            Arc::new(fixtures::sample_lookup()),
            Arc::new(NoopTracer),
        );

        let first = pipeline
            .call(CallContext::new(), NameRequest::new("ed"))
            .await
            .unwrap();
        assert_eq!(first.value, fixtures::SAMPLE_ID);

        let second = pipeline
            .call(CallContext::new(), NameRequest::new("ed"))
            .await;
        assert_eq!(second, Err(ServiceError::RateLimited));
    }

    #[tokio::test]
    async fn test_breaker_transition_logged_once() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let mut config = LoginsvcConfig::default();
        config.rate_limit.burst = 10;
        config.circuit_breaker.consecutive_failures = 1;
        let lookup = fixtures::SlowLookup::new(fixtures::sample_lookup(), Duration::from_millis(200));
        let pipeline = server_pipeline(&config, Arc::new(lookup), Arc::new(NoopTracer));

        let result = pipeline
            .call(
                CallContext::with_timeout(Duration::from_millis(20)),
                NameRequest::new("ed"),
            )
            .await;
        assert_eq!(result, Err(ServiceError::DeadlineExceeded));

        let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert_eq!(logs.matches("circuit breaker").count(), 1, "{logs}");
        assert!(logs.contains("circuit breaker opened"));
    }
}
