//! Name resolution over both transports, raw and through client stubs.

use loginsvc_client::ClientConfig;
use loginsvc_core::{CallContext, MemoryLookup, NameService, ServiceError};
use loginsvc_test::TestServer;
use std::time::Duration;

fn ctx() -> CallContext {
    CallContext::with_timeout(Duration::from_secs(5))
}

#[tokio::test]
async fn test_http_resolves_ed() {
    let server = TestServer::start().await.unwrap();

    let (status, body) = server.post_name(r#"{"n":"ed"}"#).await.unwrap();
    assert_eq!(status, 200);
    assert_eq!(body, serde_json::json!({"v": "a123456789"}));
}

#[tokio::test]
async fn test_grpc_resolves_ed() {
    let server = TestServer::start().await.unwrap();

    let reply = server.grpc_name("ed").await.unwrap().unwrap();
    assert_eq!(reply.v, "a123456789");
    assert_eq!(reply.err, "");
}

#[tokio::test]
async fn test_http_unknown_name() {
    let server = TestServer::start().await.unwrap();

    let (status, body) = server.post_name(r#"{"n":"unknown"}"#).await.unwrap();
    assert_ne!(status, 200);
    assert!(!body["error"].as_str().unwrap().is_empty());
    assert!(body.get("v").is_none());
}

#[tokio::test]
async fn test_grpc_unknown_name() {
    let server = TestServer::start().await.unwrap();

    let reply = server.grpc_name("unknown").await.unwrap().unwrap();
    assert!(reply.v.is_empty());
    assert!(!reply.err.is_empty());
}

#[tokio::test]
async fn test_error_message_equal_across_transports() {
    let server = TestServer::start().await.unwrap();
    let config = ClientConfig::default();
    let http = server.http_client(&config).unwrap();
    let grpc = server.grpc_client(&config).await.unwrap();

    let over_http = http.resolve(ctx(), "unknown".to_string()).await.unwrap_err();
    let over_grpc = grpc.resolve(ctx(), "unknown".to_string()).await.unwrap_err();

    assert_eq!(over_http.to_string(), over_grpc.to_string());
    assert_eq!(
        over_grpc.to_string(),
        ServiceError::not_found("unknown").to_string()
    );
    assert!(matches!(over_http, ServiceError::Transport { .. }));
    assert!(matches!(over_grpc, ServiceError::Remote { .. }));
}

#[tokio::test]
async fn test_stubs_resolve_ed() {
    let server = TestServer::start().await.unwrap();
    let config = ClientConfig::default();

    for client in [
        server.http_client(&config).unwrap(),
        server.grpc_client(&config).await.unwrap(),
    ] {
        assert_eq!(
            client.resolve(ctx(), "ed".to_string()).await,
            Ok("a123456789".to_string())
        );
    }
}

#[tokio::test]
async fn test_found_empty_id_round_trips() {
    let server = TestServer::builder()
        .lookup(MemoryLookup::new().with_record("ghost", ""))
        .start()
        .await
        .unwrap();
    let config = ClientConfig::default();

    let (status, body) = server.post_name(r#"{"n":"ghost"}"#).await.unwrap();
    assert_eq!(status, 200);
    assert_eq!(body["v"], "");

    let grpc = server.grpc_client(&config).await.unwrap();
    assert_eq!(grpc.resolve(ctx(), "ghost".to_string()).await, Ok(String::new()));
}

#[tokio::test]
async fn test_empty_name_is_forwarded() {
    let server = TestServer::builder()
        .lookup(MemoryLookup::new().with_record("", "anonymous"))
        .start()
        .await
        .unwrap();

    let (status, body) = server.post_name("{}").await.unwrap();
    assert_eq!(status, 200);
    assert_eq!(body["v"], "anonymous");
}

#[tokio::test]
async fn test_http_routing_errors() {
    let server = TestServer::start().await.unwrap();

    let (status, body) = server.post_name("{not json").await.unwrap();
    assert_eq!(status, 400);
    assert!(body["error"].is_string());

    let (status, _) = server
        .request(reqwest::Method::POST, "/nope", "{}")
        .await
        .unwrap();
    assert_eq!(status, 404);

    let (status, _) = server
        .request(reqwest::Method::GET, "/name", "")
        .await
        .unwrap();
    assert_eq!(status, 405);
}

#[tokio::test]
async fn test_stop_is_clean() {
    let server = TestServer::start().await.unwrap();
    let (status, _) = server.post_name(r#"{"n":"ed"}"#).await.unwrap();
    assert_eq!(status, 200);

    server.stop().await.unwrap();
}
