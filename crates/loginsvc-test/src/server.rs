//! A loginsvc running in-process on ephemeral ports.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use tokio::task::JoinHandle;

use loginsvc_client::{ClientConfig, NameClient};
use loginsvc_config::{CircuitBreakerSection, LoginsvcConfig, RateLimitSection};
use loginsvc_core::{fixtures, Lookup, NoopTracer, Tracer};
use loginsvc_proto::{pb, LoginClient};
use loginsvc_server::{server_pipeline, Server, ShutdownSignal};

use crate::error::TestError;

/// Builder for [`TestServer`].
///
/// Defaults differ from production: the limiter is wide open so tests can
/// make many calls, and the lookup holds the sample record `ed`.
pub struct TestServerBuilder {
    config: LoginsvcConfig,
    lookup: Arc<dyn Lookup>,
    tracer: Arc<dyn Tracer>,
}

impl TestServerBuilder {
    fn new() -> Self {
        let mut config = LoginsvcConfig::default();
        config.server.http_addr = "127.0.0.1:0".to_string();
        config.server.grpc_addr = "127.0.0.1:0".to_string();
        config.server.shutdown_timeout_secs = 1;
        config.rate_limit = RateLimitSection {
            burst: 10_000,
            refill_interval_ms: 1,
        };

        Self {
            config,
            lookup: Arc::new(fixtures::sample_lookup()),
            tracer: Arc::new(NoopTracer),
        }
    }

    /// Uses `lookup` as the backing store.
    #[must_use]
    pub fn lookup(mut self, lookup: impl Lookup) -> Self {
        self.lookup = Arc::new(lookup);
        self
    }

    /// Replaces the server limiter settings.
    #[must_use]
    pub fn rate_limit(mut self, burst: u32, refill_interval: Duration) -> Self {
        self.config.rate_limit = RateLimitSection {
            burst,
            refill_interval_ms: u64::try_from(refill_interval.as_millis()).unwrap_or(u64::MAX),
        };
        self
    }

    /// Replaces the server breaker settings.
    #[must_use]
    pub fn circuit_breaker(mut self, section: CircuitBreakerSection) -> Self {
        self.config.circuit_breaker = section;
        self
    }

    /// Sets the per-call timeout applied by both adapters.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.server.request_timeout_ms =
            u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Uses `tracer` for server spans.
    #[must_use]
    pub fn tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = tracer;
        self
    }

    /// Binds both listeners and starts serving in the background.
    pub async fn start(self) -> Result<TestServer, TestError> {
        let pipeline = server_pipeline(&self.config, self.lookup, self.tracer);
        let server = Server::bind(&self.config.server, Arc::new(pipeline)).await?;
        let http_addr = server.http_addr()?;
        let grpc_addr = server.grpc_addr()?;

        let shutdown = ShutdownSignal::new();
        let task = tokio::spawn(server.serve(shutdown.clone()));

        Ok(TestServer {
            http_addr,
            grpc_addr,
            shutdown,
            task: Some(task),
        })
    }
}

/// A running server. Shuts down when dropped.
///
/// # Example
///
/// ```no_run
/// use loginsvc_test::TestServer;
///
/// # async fn run() -> Result<(), loginsvc_test::TestError> {
/// let server = TestServer::start().await?;
/// let (status, body) = server.post_name(r#"{"n":"ed"}"#).await?;
/// assert_eq!(status, 200);
/// assert_eq!(body["v"], "a123456789");
/// # Ok(())
/// # }
/// ```
pub struct TestServer {
    http_addr: SocketAddr,
    grpc_addr: SocketAddr,
    shutdown: ShutdownSignal,
    task: Option<JoinHandle<Result<(), loginsvc_server::ServerError>>>,
}

impl std::fmt::Debug for TestServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestServer")
            .field("http_addr", &self.http_addr)
            .field("grpc_addr", &self.grpc_addr)
            .finish_non_exhaustive()
    }
}

impl TestServer {
    /// Creates a builder.
    pub fn builder() -> TestServerBuilder {
        TestServerBuilder::new()
    }

    /// Starts a server with the default test settings.
    pub async fn start() -> Result<Self, TestError> {
        Self::builder().start().await
    }

    /// Returns the HTTP address.
    pub const fn http_addr(&self) -> SocketAddr {
        self.http_addr
    }

    /// Returns the gRPC address.
    pub const fn grpc_addr(&self) -> SocketAddr {
        self.grpc_addr
    }

    /// Sends a raw body to `POST /name`.
    pub async fn post_name(&self, body: &str) -> Result<(StatusCode, serde_json::Value), TestError> {
        self.request(reqwest::Method::POST, "/name", body).await
    }

    /// Sends a raw request and decodes the JSON response body.
    pub async fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &str,
    ) -> Result<(StatusCode, serde_json::Value), TestError> {
        let response = reqwest::Client::new()
            .request(method, format!("http://{}{path}", self.http_addr))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        Ok((status, serde_json::from_slice(&bytes)?))
    }

    /// Calls `/pb.Login/Name` with a raw generated client.
    pub async fn grpc_name(&self, n: &str) -> Result<Result<pb::NameReply, tonic::Status>, TestError> {
        let mut client = LoginClient::connect(format!("http://{}", self.grpc_addr)).await?;
        let reply = client
            .name(pb::NameRequest { n: n.to_string() })
            .await
            .map(tonic::Response::into_inner);
        Ok(reply)
    }

    /// Builds a client stub over HTTP.
    pub fn http_client(&self, config: &ClientConfig) -> Result<NameClient, TestError> {
        Ok(loginsvc_client::http_client(&self.http_addr.to_string(), config)?)
    }

    /// Builds a client stub over gRPC.
    pub async fn grpc_client(&self, config: &ClientConfig) -> Result<NameClient, TestError> {
        Ok(loginsvc_client::grpc_client(&self.grpc_addr.to_string(), config).await?)
    }

    /// Triggers shutdown and waits for both servers to stop.
    pub async fn stop(mut self) -> Result<(), loginsvc_server::ServerError> {
        self.shutdown.trigger();
        match self.task.take() {
            Some(task) => task
                .await
                .unwrap_or_else(|e| Err(std::io::Error::other(e).into())),
            None => Ok(()),
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}
