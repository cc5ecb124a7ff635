//! gRPC network endpoint.
//!
//! A non-empty `err` in the reply becomes [`ServiceError::Remote`] carrying
//! the server's message verbatim. Nothing else about the server-side error
//! survives the wire.

use std::time::Duration;

use tonic::transport::{Channel, Endpoint as ChannelEndpoint};

use loginsvc_core::{
    propagation, BoxFuture, CallContext, Endpoint, NameRequest, NameResponse, ServiceError,
    ServiceResult,
};
use loginsvc_proto::{pb, LoginClient, MetadataInjector};

use crate::error::{with_scheme, ClientError};

/// Default dial timeout.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(1);

/// Calls `/pb.Login/Name` over a shared channel.
#[derive(Debug, Clone)]
pub struct GrpcNameEndpoint {
    client: LoginClient<Channel>,
}

impl GrpcNameEndpoint {
    /// Dials `addr` with the default one second timeout.
    pub async fn connect(addr: &str) -> Result<Self, ClientError> {
        Self::connect_with_timeout(addr, DEFAULT_DIAL_TIMEOUT).await
    }

    /// Dials `addr`, giving up after `dial_timeout`.
    pub async fn connect_with_timeout(addr: &str, dial_timeout: Duration) -> Result<Self, ClientError> {
        let endpoint = ChannelEndpoint::from_shared(with_scheme(addr))
            .map_err(|e| ClientError::invalid_address(addr, e))?
            .connect_timeout(dial_timeout);

        let channel = tokio::time::timeout(dial_timeout, endpoint.connect())
            .await
            .map_err(|_| ClientError::connect(addr, "dial timed out"))?
            .map_err(|e| ClientError::connect(addr, e))?;

        tracing::debug!(addr, "gRPC channel connected");
        Ok(Self::from_channel(channel))
    }

    /// Wraps an existing channel.
    pub fn from_channel(channel: Channel) -> Self {
        Self {
            client: LoginClient::new(channel),
        }
    }

    async fn send(&self, ctx: CallContext, request: NameRequest) -> ServiceResult<NameResponse> {
        let mut grpc_request = tonic::Request::new(pb::NameRequest::from(request));
        if let Some(trace) = ctx.trace() {
            propagation::inject(trace, &mut MetadataInjector(grpc_request.metadata_mut()));
        }

        let mut client = self.client.clone();
        let reply = match ctx.remaining() {
            Some(remaining) if remaining.is_zero() => return Err(ServiceError::DeadlineExceeded),
            Some(remaining) => {
                grpc_request.set_timeout(remaining);
                tokio::time::timeout(remaining, client.name(grpc_request))
                    .await
                    .map_err(|_| ServiceError::DeadlineExceeded)?
            }
            None => client.name(grpc_request).await,
        };

        match reply {
            Ok(reply) => Ok(NameResponse::from(reply.into_inner())),
            Err(status) => Err(error_from_status(&status)),
        }
    }
}

impl Endpoint<NameRequest, NameResponse> for GrpcNameEndpoint {
    fn call(
        &self,
        ctx: CallContext,
        request: NameRequest,
    ) -> BoxFuture<'_, ServiceResult<NameResponse>> {
        Box::pin(self.send(ctx, request))
    }
}

/// A non-OK status is a transport failure carrying the status message.
pub(crate) fn error_from_status(status: &tonic::Status) -> ServiceError {
    match status.code() {
        tonic::Code::DeadlineExceeded => ServiceError::DeadlineExceeded,
        _ => ServiceError::transport(status.message()),
    }
}
