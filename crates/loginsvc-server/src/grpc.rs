//! gRPC transport adapter for `pb.Login`.
//!
//! Business errors travel in `NameReply.err` with an OK status. Calls the
//! pipeline refuses to run map to gRPC status codes:
//!
//! | Error | Code |
//! |-------|------|
//! | `RateLimited` | `RESOURCE_EXHAUSTED` |
//! | `Unavailable` | `UNAVAILABLE` |
//! | `DeadlineExceeded` | `DEADLINE_EXCEEDED` |
//! | anything else | `UNKNOWN` |

use std::time::Duration;

use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{Request, Response, Status};

use loginsvc_core::{propagation, CallContext, Endpoint, NameRequest, ServiceError};
use loginsvc_proto::{pb, Login, LoginServer, MetadataExtractor};

use crate::error::ServerError;
use crate::pipeline::SharedEndpoint;
use crate::shutdown::ShutdownSignal;

/// Implements the `Login` service on top of the shared pipeline.
#[derive(Clone)]
pub struct GrpcAdapter {
    endpoint: SharedEndpoint,
    request_timeout: Duration,
}

impl std::fmt::Debug for GrpcAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrpcAdapter")
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl GrpcAdapter {
    /// Creates an adapter that gives every call `request_timeout`.
    pub fn new(endpoint: SharedEndpoint, request_timeout: Duration) -> Self {
        Self {
            endpoint,
            request_timeout,
        }
    }
}

/// Maps an error the pipeline returned instead of a response.
pub fn status_for(error: &ServiceError) -> Status {
    let message = error.to_string();
    match error {
        ServiceError::RateLimited => Status::resource_exhausted(message),
        ServiceError::Unavailable { .. } => Status::unavailable(message),
        ServiceError::DeadlineExceeded => Status::deadline_exceeded(message),
        _ => Status::unknown(message),
    }
}

#[tonic::async_trait]
impl Login for GrpcAdapter {
    async fn name(
        &self,
        request: Request<pb::NameRequest>,
    ) -> Result<Response<pb::NameReply>, Status> {
        let mut ctx = CallContext::with_timeout(self.request_timeout);
        if let Some(parent) = propagation::extract(&MetadataExtractor(request.metadata())) {
            ctx.set_trace(parent);
        }

        let request = NameRequest::from(request.into_inner());
        match self.endpoint.call(ctx, request).await {
            Ok(response) => Ok(Response::new(pb::NameReply::from(response))),
            Err(error) => Err(status_for(&error)),
        }
    }
}

/// Serves `pb.Login` on `listener` until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    adapter: GrpcAdapter,
    shutdown: ShutdownSignal,
) -> Result<(), ServerError> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "gRPC server listening");
    }

    tonic::transport::Server::builder()
        .add_service(LoginServer::new(adapter))
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown.recv())
        .await?;

    tracing::info!("gRPC server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use loginsvc_core::{
        fixtures, BoxFuture, FnEndpoint, NameResponse, NameService, ResolveEndpoint, Resolver,
        ServiceResult, TraceContext,
    };
    use loginsvc_proto::MetadataInjector;
    use std::sync::Arc;

    fn adapter() -> GrpcAdapter {
        GrpcAdapter::new(
            Arc::new(ResolveEndpoint::new(Resolver::new(fixtures::sample_lookup()))),
            Duration::from_secs(5),
        )
    }

    fn name_request(n: &str) -> Request<pb::NameRequest> {
        Request::new(pb::NameRequest { n: n.to_string() })
    }

    #[tokio::test]
    async fn test_resolves_name() {
        let reply = adapter().name(name_request("ed")).await.unwrap().into_inner();
        assert_eq!(reply.v, "a123456789");
        assert!(reply.err.is_empty());
    }

    #[tokio::test]
    async fn test_business_error_in_reply() {
        let reply = adapter()
            .name(name_request("unknown"))
            .await
            .unwrap()
            .into_inner();
        assert!(reply.v.is_empty());
        assert_eq!(reply.err, ServiceError::not_found("unknown").to_string());
    }

    #[tokio::test]
    async fn test_rejections_map_to_status() {
        for (error, code) in [
            (ServiceError::RateLimited, tonic::Code::ResourceExhausted),
            (ServiceError::unavailable("Name"), tonic::Code::Unavailable),
            (ServiceError::unknown("boom"), tonic::Code::Unknown),
        ] {
            let expected = error.to_string();
            let endpoint = FnEndpoint::new(move |_ctx: CallContext, _req: NameRequest| {
                let error = error.clone();
                async move { ServiceResult::<NameResponse>::Err(error) }
            });
            let adapter = GrpcAdapter::new(Arc::new(endpoint), Duration::from_secs(5));

            let status = adapter.name(name_request("ed")).await.unwrap_err();
            assert_eq!(status.code(), code);
            assert_eq!(status.message(), expected);
        }
    }

    struct Stalled;

    impl NameService for Stalled {
        fn resolve(&self, _ctx: CallContext, _name: String) -> BoxFuture<'_, ServiceResult<String>> {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok("late".to_string())
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_exceeded() {
        let adapter = GrpcAdapter::new(
            Arc::new(ResolveEndpoint::new(Stalled)),
            Duration::from_millis(50),
        );

        let status = adapter.name(name_request("ed")).await.unwrap_err();
        assert_eq!(status.code(), tonic::Code::DeadlineExceeded);
    }

    #[tokio::test]
    async fn test_traceparent_from_metadata() {
        let parent = TraceContext::new_root();
        let endpoint = FnEndpoint::new(|ctx: CallContext, _req: NameRequest| {
            let seen = ctx.trace_id().unwrap_or_default().to_string();
            async move { ServiceResult::Ok(NameResponse::found(seen)) }
        });
        let adapter = GrpcAdapter::new(Arc::new(endpoint), Duration::from_secs(5));

        let mut request = name_request("ed");
        propagation::inject(&parent, &mut MetadataInjector(request.metadata_mut()));
        let reply = adapter.name(request).await.unwrap().into_inner();
        assert_eq!(reply.v, parent.trace_id);
    }
}
