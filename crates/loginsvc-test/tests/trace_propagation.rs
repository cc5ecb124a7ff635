//! Client spans become the parents of server spans across the wire.

use loginsvc_client::ClientConfig;
use loginsvc_core::{CallContext, NameService, SpanKind};
use loginsvc_telemetry::RecordingTracer;
use loginsvc_test::TestServer;
use std::sync::Arc;
use std::time::Duration;

async fn assert_linked(over_grpc: bool) {
    let server_spans = RecordingTracer::new();
    let client_spans = RecordingTracer::new();
    let server = TestServer::builder()
        .tracer(Arc::new(server_spans.clone()))
        .start()
        .await
        .unwrap();

    let config = ClientConfig::default().tracer(Arc::new(client_spans.clone()));
    let client = if over_grpc {
        server.grpc_client(&config).await.unwrap()
    } else {
        server.http_client(&config).unwrap()
    };

    client
        .resolve(
            CallContext::with_timeout(Duration::from_secs(5)),
            "ed".to_string(),
        )
        .await
        .unwrap();

    let client_span = client_spans.finished().pop().expect("client span");
    assert_eq!(client_span.kind, SpanKind::Client);
    assert!(client_span.parent.is_none());

    let server_span = server_spans
        .trace(&client_span.context.trace_id)
        .pop()
        .expect("server span in the client's trace");
    assert_eq!(server_span.kind, SpanKind::Server);
    assert_eq!(server_span.operation, "Name");
    assert_eq!(server_span.parent.as_ref(), Some(&client_span.context));
    assert!(!server_span.is_error());
}

#[tokio::test]
async fn test_trace_crosses_http() {
    assert_linked(false).await;
}

#[tokio::test]
async fn test_trace_crosses_grpc() {
    assert_linked(true).await;
}

#[tokio::test]
async fn test_server_span_records_business_error() {
    let server_spans = RecordingTracer::new();
    let server = TestServer::builder()
        .tracer(Arc::new(server_spans.clone()))
        .start()
        .await
        .unwrap();

    let reply = server.grpc_name("unknown").await.unwrap().unwrap();
    assert!(!reply.err.is_empty());

    let span = server_spans.finished().pop().expect("server span");
    assert!(span.is_error());
    assert_eq!(span.error.as_deref(), Some(reply.err.as_str()));
    assert!(span.parent.is_none());
}
