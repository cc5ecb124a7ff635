//! HTTP+JSON network endpoint.

use reqwest::header::HeaderMap;
use reqwest::{StatusCode, Url};

use loginsvc_core::{
    propagation, BoxFuture, CallContext, Endpoint, NameRequest, NameResponse, ServiceError,
    ServiceResult,
};
use loginsvc_proto::json::{self, ErrorEnvelope, JsonNameReply};
use loginsvc_proto::NAME_PATH;

use crate::error::{with_scheme, ClientError};

/// Calls `POST /name` on a remote loginsvc.
#[derive(Debug, Clone)]
pub struct HttpNameEndpoint {
    client: reqwest::Client,
    url: Url,
}

impl HttpNameEndpoint {
    /// Creates an endpoint for the service at `instance`.
    ///
    /// `instance` may be `host:port` or a full base URL; `http://` is
    /// assumed when no scheme is given. Any path is replaced by `/name`.
    pub fn new(instance: &str) -> Result<Self, ClientError> {
        let mut url =
            Url::parse(&with_scheme(instance)).map_err(|e| ClientError::invalid_address(instance, e))?;
        if url.cannot_be_a_base() {
            return Err(ClientError::invalid_address(instance, "not a base URL"));
        }
        url.set_path(NAME_PATH);

        let client = reqwest::Client::builder().build()?;
        Ok(Self { client, url })
    }

    /// Returns the request URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn send(&self, ctx: CallContext, request: NameRequest) -> ServiceResult<NameResponse> {
        let body = json::encode_request(&request)?;

        let mut headers = HeaderMap::new();
        if let Some(trace) = ctx.trace() {
            propagation::inject(trace, &mut headers);
        }

        let mut builder = self
            .client
            .post(self.url.clone())
            .headers(headers)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);
        if let Some(remaining) = ctx.remaining() {
            if remaining.is_zero() {
                return Err(ServiceError::DeadlineExceeded);
            }
            builder = builder.timeout(remaining);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(map_reqwest_error)?;

        if status != StatusCode::OK {
            return Err(error_from_body(status, &bytes));
        }

        let reply: JsonNameReply = serde_json::from_slice(&bytes)
            .map_err(|e| ServiceError::transport(format!("invalid response body: {e}")))?;
        Ok(NameResponse::found(reply.v))
    }
}

impl Endpoint<NameRequest, NameResponse> for HttpNameEndpoint {
    fn call(
        &self,
        ctx: CallContext,
        request: NameRequest,
    ) -> BoxFuture<'_, ServiceResult<NameResponse>> {
        Box::pin(self.send(ctx, request))
    }
}

fn map_reqwest_error(error: reqwest::Error) -> ServiceError {
    if error.is_timeout() {
        ServiceError::DeadlineExceeded
    } else {
        ServiceError::transport(error.to_string())
    }
}

/// Decodes a non-200 response into a transport error carrying the server's
/// message, or the status line when the body is not an error envelope.
pub(crate) fn error_from_body(status: StatusCode, body: &[u8]) -> ServiceError {
    match serde_json::from_slice::<ErrorEnvelope>(body) {
        Ok(envelope) => ServiceError::transport(envelope.error),
        Err(_) => ServiceError::transport(status.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_url_gets_scheme_and_path() {
        let endpoint = HttpNameEndpoint::new("localhost:8081").unwrap();
        assert_eq!(endpoint.url().as_str(), "http://localhost:8081/name");

        let endpoint = HttpNameEndpoint::new("https://login.example/api").unwrap();
        assert_eq!(endpoint.url().as_str(), "https://login.example/name");
    }

    #[test]
    fn test_invalid_address() {
        assert!(matches!(
            HttpNameEndpoint::new("http://"),
            Err(ClientError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn test_error_from_envelope() {
        let error = error_from_body(
            StatusCode::INTERNAL_SERVER_ERROR,
            br#"{"error":"no subject found for name \"bob\""}"#,
        );
        assert_eq!(error.to_string(), r#"no subject found for name "bob""#);
        assert!(matches!(error, ServiceError::Transport { .. }));
    }

    #[test]
    fn test_error_from_status_line() {
        let error = error_from_body(StatusCode::BAD_GATEWAY, b"<html>bad gateway</html>");
        assert_eq!(error.to_string(), "502 Bad Gateway");
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let endpoint = HttpNameEndpoint::new(&addr.to_string()).unwrap();
        let err = endpoint
            .call(CallContext::with_timeout(Duration::from_secs(2)), NameRequest::new("ed"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Transport { .. }));
    }
}
