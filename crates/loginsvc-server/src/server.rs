//! Runs the HTTP and gRPC servers side by side over one pipeline.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;

use loginsvc_config::ServerConfig;

use crate::error::ServerError;
use crate::grpc::{self, GrpcAdapter};
use crate::http::{self, HttpAdapter};
use crate::pipeline::SharedEndpoint;
use crate::shutdown::ShutdownSignal;

/// Both listeners, bound and ready to serve.
///
/// Binding is separate from serving so callers (and tests using port 0) can
/// learn the actual addresses first.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use loginsvc_config::ServerConfig;
/// use loginsvc_core::{fixtures, ResolveEndpoint, Resolver};
/// use loginsvc_server::{Server, ShutdownSignal};
///
/// # async fn run() -> Result<(), loginsvc_server::ServerError> {
/// let endpoint = Arc::new(ResolveEndpoint::new(Resolver::new(fixtures::sample_lookup())));
/// let server = Server::bind(&ServerConfig::default(), endpoint).await?;
/// server.serve(ShutdownSignal::with_os_signals()).await
/// # }
/// ```
pub struct Server {
    http_listener: TcpListener,
    grpc_listener: TcpListener,
    endpoint: SharedEndpoint,
    request_timeout: Duration,
    shutdown_timeout: Duration,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("http_addr", &self.http_listener.local_addr().ok())
            .field("grpc_addr", &self.grpc_listener.local_addr().ok())
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl Server {
    /// Binds the HTTP and gRPC listeners from `config`.
    pub async fn bind(config: &ServerConfig, endpoint: SharedEndpoint) -> Result<Self, ServerError> {
        let http_listener = bind_listener(&config.http_addr).await?;
        let grpc_listener = bind_listener(&config.grpc_addr).await?;

        Ok(Self {
            http_listener,
            grpc_listener,
            endpoint,
            request_timeout: config.request_timeout(),
            shutdown_timeout: config.shutdown_timeout(),
        })
    }

    /// Returns the bound HTTP address.
    pub fn http_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.http_listener.local_addr()?)
    }

    /// Returns the bound gRPC address.
    pub fn grpc_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.grpc_listener.local_addr()?)
    }

    /// Serves both transports until `shutdown` fires or the gRPC server
    /// fails. A gRPC failure also stops the HTTP server.
    pub async fn serve(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let http = http::serve(
            self.http_listener,
            HttpAdapter::new(self.endpoint.clone(), self.request_timeout),
            shutdown.clone(),
            self.shutdown_timeout,
        );
        let grpc = grpc::serve(
            self.grpc_listener,
            GrpcAdapter::new(self.endpoint, self.request_timeout),
            shutdown.clone(),
        );

        let grpc = async {
            let result = grpc.await;
            if result.is_err() {
                shutdown.trigger();
            }
            result
        };

        let ((), grpc_result) = tokio::join!(http, grpc);
        grpc_result
    }
}

async fn bind_listener(addr: &str) -> Result<TcpListener, ServerError> {
    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| ServerError::invalid_address(addr, e))?;
    TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })
}
