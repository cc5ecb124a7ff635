//! Rate limiting, circuit breaking and deadlines through real servers.

use loginsvc_client::ClientConfig;
use loginsvc_config::CircuitBreakerSection;
use loginsvc_core::fixtures::{sample_lookup, CountingLookup, SlowLookup};
use loginsvc_core::{CallContext, NameService, ServiceError};
use loginsvc_telemetry::RecordingTracer;
use loginsvc_test::TestServer;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn breaker(consecutive_failures: u32, open_timeout_ms: u64) -> CircuitBreakerSection {
    CircuitBreakerSection {
        consecutive_failures,
        open_timeout_ms,
        ..CircuitBreakerSection::default()
    }
}

#[tokio::test]
async fn test_excess_calls_are_rate_limited() {
    let lookup = CountingLookup::new(sample_lookup());
    let server = TestServer::builder()
        .lookup(lookup.clone())
        .rate_limit(2, Duration::from_secs(60))
        .start()
        .await
        .unwrap();

    for _ in 0..2 {
        let (status, _) = server.post_name(r#"{"n":"ed"}"#).await.unwrap();
        assert_eq!(status, 200);
    }

    let (status, body) = server.post_name(r#"{"n":"ed"}"#).await.unwrap();
    assert_eq!(status, 429);
    assert_eq!(body["error"], "rate limit exceeded");

    let status = server.grpc_name("ed").await.unwrap().unwrap_err();
    assert_eq!(status.code(), tonic::Code::ResourceExhausted);

    assert_eq!(lookup.calls(), 2);
}

#[tokio::test]
async fn test_limiter_is_shared_across_transports() {
    let server = TestServer::builder()
        .rate_limit(1, Duration::from_secs(60))
        .start()
        .await
        .unwrap();

    let (status, _) = server.post_name(r#"{"n":"ed"}"#).await.unwrap();
    assert_eq!(status, 200);

    let status = server.grpc_name("ed").await.unwrap().unwrap_err();
    assert_eq!(status.code(), tonic::Code::ResourceExhausted);
}

#[tokio::test]
async fn test_breaker_opens_and_recovers() {
    let lookup = CountingLookup::new(sample_lookup());
    let server = TestServer::builder()
        .lookup(lookup.clone())
        .circuit_breaker(breaker(3, 200))
        .start()
        .await
        .unwrap();

    lookup.set_failing(true);
    for _ in 0..3 {
        let (status, body) = server.post_name(r#"{"n":"ed"}"#).await.unwrap();
        assert_eq!(status, 500);
        assert_eq!(body["error"], "backend unavailable");
    }

    let (status, body) = server.post_name(r#"{"n":"ed"}"#).await.unwrap();
    assert_eq!(status, 503);
    assert_eq!(body["error"], "circuit breaker 'Name' is open");

    let status = server.grpc_name("ed").await.unwrap().unwrap_err();
    assert_eq!(status.code(), tonic::Code::Unavailable);
    assert_eq!(lookup.calls(), 3);

    tokio::time::sleep(Duration::from_millis(300)).await;
    lookup.set_failing(false);

    let (status, _) = server.post_name(r#"{"n":"ed"}"#).await.unwrap();
    assert_eq!(status, 200);
    assert_eq!(lookup.calls(), 4);

    let (status, _) = server.post_name(r#"{"n":"ed"}"#).await.unwrap();
    assert_eq!(status, 200);
    assert_eq!(lookup.calls(), 5);
}

#[tokio::test]
async fn test_failed_trial_reopens_breaker() {
    let lookup = CountingLookup::new(sample_lookup());
    let server = TestServer::builder()
        .lookup(lookup.clone())
        .circuit_breaker(breaker(2, 200))
        .start()
        .await
        .unwrap();

    lookup.set_failing(true);
    for _ in 0..2 {
        server.post_name(r#"{"n":"ed"}"#).await.unwrap();
    }

    tokio::time::sleep(Duration::from_millis(300)).await;
    let (status, _) = server.post_name(r#"{"n":"ed"}"#).await.unwrap();
    assert_eq!(status, 500);
    assert_eq!(lookup.calls(), 3);

    let (status, _) = server.post_name(r#"{"n":"ed"}"#).await.unwrap();
    assert_eq!(status, 503);
    assert_eq!(lookup.calls(), 3);
}

#[tokio::test]
async fn test_not_found_counts_as_breaker_failure() {
    let lookup = CountingLookup::new(sample_lookup());
    let server = TestServer::builder()
        .lookup(lookup.clone())
        .circuit_breaker(breaker(2, 60_000))
        .start()
        .await
        .unwrap();

    for _ in 0..2 {
        let reply = server.grpc_name("unknown").await.unwrap().unwrap();
        assert!(!reply.err.is_empty());
    }

    let status = server.grpc_name("ed").await.unwrap().unwrap_err();
    assert_eq!(status.code(), tonic::Code::Unavailable);
    assert_eq!(lookup.calls(), 2);
}

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

impl Captured {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

#[tokio::test]
async fn test_server_deadline() {
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let spans = RecordingTracer::new();
    let server = TestServer::builder()
        .lookup(SlowLookup::new(sample_lookup(), Duration::from_millis(500)))
        .request_timeout(Duration::from_millis(100))
        .tracer(Arc::new(spans.clone()))
        .start()
        .await
        .unwrap();

    let (status, body) = server.post_name(r#"{"n":"ed"}"#).await.unwrap();
    assert_eq!(status, 504);
    assert_eq!(body["error"], "deadline exceeded");

    let status = server.grpc_name("ed").await.unwrap().unwrap_err();
    assert_eq!(status.code(), tonic::Code::DeadlineExceeded);

    let finished = spans.finished();
    assert_eq!(finished.len(), 2);
    for span in &finished {
        assert_eq!(span.operation, "Name");
        assert_eq!(span.annotation("outcome"), Some("error"));
        assert_eq!(span.error.as_deref(), Some("deadline exceeded"));
    }

    let logs = captured.contents();
    assert_eq!(logs.matches("call completed").count(), 2);
    assert_eq!(logs.matches("error=deadline exceeded").count(), 2);
    assert!(!logs.contains("call cancelled"));
}

#[tokio::test]
async fn test_client_deadline() {
    let server = TestServer::builder()
        .lookup(SlowLookup::new(sample_lookup(), Duration::from_millis(500)))
        .start()
        .await
        .unwrap();
    let client = server.http_client(&ClientConfig::default()).unwrap();

    let err = client
        .resolve(
            CallContext::with_timeout(Duration::from_millis(100)),
            "ed".to_string(),
        )
        .await
        .unwrap_err();
    assert_eq!(err, ServiceError::DeadlineExceeded);
}

#[tokio::test]
async fn test_client_limiter_fails_fast() {
    let server = TestServer::start().await.unwrap();
    let mut config = ClientConfig::default();
    config.rate_limit.burst = 1;
    config.rate_limit.refill_interval = Duration::from_secs(60);

    let client = server.http_client(&config).unwrap();
    let ctx = || CallContext::with_timeout(Duration::from_secs(5));
    assert!(client.resolve(ctx(), "ed".to_string()).await.is_ok());
    assert_eq!(
        client.resolve(ctx(), "ed".to_string()).await,
        Err(ServiceError::RateLimited)
    );
}
