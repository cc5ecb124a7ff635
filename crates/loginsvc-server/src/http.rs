//! HTTP+JSON transport adapter.
//!
//! One route, `POST /name`. The body is decoded before the pipeline runs, so
//! a malformed body never costs a rate limit token.
//!
//! | Outcome | Status | Body |
//! |---------|--------|------|
//! | Resolved | 200 | `{"v": ..}` |
//! | Business error | from [`ServiceError::status_code`] | `{"error": ..}` |
//! | Rejected by limiter / breaker | 429 / 503 | `{"error": ..}` |
//! | Deadline elapsed | 504 | `{"error": ..}` |
//! | Malformed body | 400 | `{"error": ..}` |
//! | Body over [`MAX_BODY_BYTES`] | 413 | `{"error": ..}` |
//! | Unknown path / wrong method | 404 / 405 | `{"error": ..}` |

use std::convert::Infallible;
use std::error::Error as StdError;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::{ALLOW, CONTENT_TYPE};
use http::{HeaderValue, Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use serde::Serialize;
use tokio::net::{TcpListener, TcpStream};

use loginsvc_core::{
    propagation, CallContext, Endpoint, NameResponse, ServiceError, ServiceResult,
};
use loginsvc_proto::json::{self, ErrorEnvelope, JsonNameReply};
use loginsvc_proto::NAME_PATH;

use crate::pipeline::SharedEndpoint;
use crate::shutdown::{ConnectionTracker, ShutdownSignal};

/// Largest request body accepted. A `{"n": ..}` body is far smaller.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Response body type.
pub type ResponseBody = Full<Bytes>;

/// A complete HTTP response.
pub type HttpResponse = Response<ResponseBody>;

/// Translates HTTP requests into pipeline calls.
#[derive(Clone)]
pub struct HttpAdapter {
    endpoint: SharedEndpoint,
    request_timeout: Duration,
}

impl std::fmt::Debug for HttpAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpAdapter")
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl HttpAdapter {
    /// Creates an adapter that gives every call `request_timeout`.
    pub fn new(endpoint: SharedEndpoint, request_timeout: Duration) -> Self {
        Self {
            endpoint,
            request_timeout,
        }
    }

    /// Handles one request. Never fails; every outcome is a response.
    pub async fn handle<B>(&self, req: Request<B>) -> HttpResponse
    where
        B: Body,
        B::Error: Into<Box<dyn StdError + Send + Sync>>,
    {
        if req.uri().path() != NAME_PATH {
            return error_response(
                StatusCode::NOT_FOUND,
                &format!("no route for {}", req.uri().path()),
            );
        }
        if req.method() != Method::POST {
            let mut response = error_response(
                StatusCode::METHOD_NOT_ALLOWED,
                &format!("method {} not allowed on {NAME_PATH}", req.method()),
            );
            response
                .headers_mut()
                .insert(ALLOW, HeaderValue::from_static("POST"));
            return response;
        }

        let mut ctx = CallContext::with_timeout(self.request_timeout);
        if let Some(parent) = propagation::extract(req.headers()) {
            ctx.set_trace(parent);
        }

        let limited = Limited::new(req.into_body(), MAX_BODY_BYTES);
        let body = match tokio::time::timeout(self.request_timeout, limited.collect()).await {
            Ok(Ok(collected)) => collected.to_bytes(),
            Ok(Err(e)) if e.is::<LengthLimitError>() => {
                return error_response(
                    StatusCode::PAYLOAD_TOO_LARGE,
                    &format!("request body exceeds {MAX_BODY_BYTES} bytes"),
                );
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "failed to read request body");
                return service_error_response(&ServiceError::malformed(e.to_string()));
            }
            Err(_) => return service_error_response(&ServiceError::DeadlineExceeded),
        };

        let request = match json::decode_request(&body) {
            Ok(request) => request,
            Err(error) => return service_error_response(&error),
        };

        // The pipeline enforces the deadline carried in `ctx`.
        let result: ServiceResult<NameResponse> = self.endpoint.call(ctx, request).await;

        match result {
            Ok(NameResponse { value, error: None }) => {
                json_response(StatusCode::OK, &JsonNameReply { v: value })
            }
            Ok(NameResponse {
                error: Some(error), ..
            })
            | Err(error) => service_error_response(&error),
        }
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> HttpResponse {
    let (status, bytes) = match serde_json::to_vec(body) {
        Ok(bytes) => (status, Bytes::from(bytes)),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode response body");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Bytes::from_static(br#"{"error":"response encoding failed"}"#),
            )
        }
    };
    let mut response = Response::new(Full::new(bytes));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn error_response(status: StatusCode, message: &str) -> HttpResponse {
    json_response(status, &ErrorEnvelope::new(message))
}

fn service_error_response(error: &ServiceError) -> HttpResponse {
    json_response(error.status_code(), &ErrorEnvelope::from(error))
}

/// Accepts HTTP/1.1 connections on `listener` until `shutdown` fires, then
/// waits up to `drain_timeout` for open connections to finish.
pub async fn serve(
    listener: TcpListener,
    adapter: HttpAdapter,
    shutdown: ShutdownSignal,
    drain_timeout: Duration,
) {
    let adapter = Arc::new(adapter);
    let tracker = ConnectionTracker::new();

    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "HTTP server listening");
    }

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, remote_addr)) => {
                    let adapter = Arc::clone(&adapter);
                    let token = tracker.acquire();
                    let shutdown = shutdown.clone();
                    tokio::spawn(async move {
                        if let Err(e) = serve_connection(stream, remote_addr, adapter, shutdown).await {
                            tracing::warn!(%remote_addr, error = %e, "connection error");
                        }
                        drop(token);
                    });
                }
                Err(e) => tracing::error!(error = %e, "failed to accept connection"),
            },
            () = shutdown.recv() => {
                tracing::info!("HTTP server stopping");
                break;
            }
        }
    }

    tokio::select! {
        () = tracker.wait_idle() => tracing::debug!("all HTTP connections closed"),
        () = tokio::time::sleep(drain_timeout) => tracing::warn!(
            active = tracker.active_connections(),
            "drain timeout reached with connections still open"
        ),
    }
}

async fn serve_connection(
    stream: TcpStream,
    remote_addr: SocketAddr,
    adapter: Arc<HttpAdapter>,
    shutdown: ShutdownSignal,
) -> Result<(), hyper::Error> {
    let service = service_fn(move |req: Request<Incoming>| {
        let adapter = Arc::clone(&adapter);
        async move {
            tracing::debug!(method = %req.method(), path = req.uri().path(), "request");
            Ok::<_, Infallible>(adapter.handle(req).await)
        }
    });

    let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);

    tokio::select! {
        result = conn.as_mut() => result,
        () = shutdown.recv() => {
            tracing::debug!(%remote_addr, "closing connection for shutdown");
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    }
}
