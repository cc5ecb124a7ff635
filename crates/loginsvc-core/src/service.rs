//! The name resolution service and its endpoint adapters.
//!
//! [`NameService`] is the domain-operation-shaped interface callers program
//! against. [`Resolver`] implements it on top of a [`Lookup`]; client stubs
//! implement it on top of a network endpoint via [`EndpointService`].
//!
//! ```text
//! NameService ──ResolveEndpoint──▶ Endpoint<NameRequest, NameResponse>
//! Endpoint<NameRequest, NameResponse> ──EndpointService──▶ NameService
//! ```

use crate::context::CallContext;
use crate::endpoint::{BoxFuture, Endpoint};
use crate::error::{LookupError, ServiceError, ServiceResult};
use crate::lookup::Lookup;
use crate::types::{NameRequest, NameResponse};
use std::sync::Arc;

/// Resolves a human-readable name to an opaque subject id.
pub trait NameService: Send + Sync + 'static {
    /// Resolves `name`.
    fn resolve(&self, ctx: CallContext, name: String) -> BoxFuture<'_, ServiceResult<String>>;
}

impl<S: NameService + ?Sized> NameService for Arc<S> {
    fn resolve(&self, ctx: CallContext, name: String) -> BoxFuture<'_, ServiceResult<String>> {
        (**self).resolve(ctx, name)
    }
}

/// The domain operation: one lookup per call, no caching or normalization.
///
/// The lookup runs on tokio's blocking pool, so a slow backend never stalls
/// the executor threads serving other calls.
#[derive(Clone)]
pub struct Resolver {
    lookup: Arc<dyn Lookup>,
}

impl Resolver {
    /// Creates a resolver backed by `lookup`.
    pub fn new(lookup: impl Lookup) -> Self {
        Self {
            lookup: Arc::new(lookup),
        }
    }

    /// Creates a resolver from an already shared lookup.
    pub fn from_shared(lookup: Arc<dyn Lookup>) -> Self {
        Self { lookup }
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver").finish_non_exhaustive()
    }
}

impl NameService for Resolver {
    fn resolve(&self, _ctx: CallContext, name: String) -> BoxFuture<'_, ServiceResult<String>> {
        let lookup = Arc::clone(&self.lookup);
        Box::pin(async move {
            let key = name.clone();
            let result = tokio::task::spawn_blocking(move || lookup.lookup(&key))
                .await
                .map_err(|e| ServiceError::unknown(format!("lookup task failed: {e}")))?;

            match result {
                Ok(id) => Ok(id),
                Err(LookupError::NotFound) => Err(ServiceError::not_found(name)),
                Err(LookupError::Backend { message }) => Err(ServiceError::unknown(message)),
            }
        })
    }
}

/// Exposes a [`NameService`] as an endpoint.
///
/// Resolution errors are business errors: they are returned inside the
/// [`NameResponse`], never as the endpoint's `Err`.
///
/// The call's deadline is enforced here, at the innermost layer, so every
/// middleware stage sees `Err(DeadlineExceeded)` and completes normally.
#[derive(Debug, Clone)]
pub struct ResolveEndpoint<S> {
    service: S,
}

impl<S: NameService> ResolveEndpoint<S> {
    /// Wraps `service`.
    pub const fn new(service: S) -> Self {
        Self { service }
    }
}

impl<S: NameService> Endpoint<NameRequest, NameResponse> for ResolveEndpoint<S> {
    fn call(
        &self,
        ctx: CallContext,
        request: NameRequest,
    ) -> BoxFuture<'_, ServiceResult<NameResponse>> {
        Box::pin(async move {
            let resolved = match ctx.remaining() {
                Some(remaining) => {
                    tokio::time::timeout(remaining, self.service.resolve(ctx, request.name))
                        .await
                        .map_err(|_| ServiceError::DeadlineExceeded)?
                }
                None => self.service.resolve(ctx, request.name).await,
            };

            Ok(match resolved {
                Ok(id) => NameResponse::found(id),
                Err(error) => NameResponse::failed(error),
            })
        })
    }
}

/// Exposes an endpoint as a [`NameService`].
///
/// Both endpoint errors and business errors carried in the response surface
/// as the call's error.
#[derive(Debug, Clone)]
pub struct EndpointService<E> {
    endpoint: E,
}

impl<E: Endpoint<NameRequest, NameResponse>> EndpointService<E> {
    /// Wraps `endpoint`.
    pub const fn new(endpoint: E) -> Self {
        Self { endpoint }
    }

    /// Returns the wrapped endpoint.
    pub const fn endpoint(&self) -> &E {
        &self.endpoint
    }
}

impl<E: Endpoint<NameRequest, NameResponse>> NameService for EndpointService<E> {
    fn resolve(&self, ctx: CallContext, name: String) -> BoxFuture<'_, ServiceResult<String>> {
        Box::pin(async move {
            self.endpoint
                .call(ctx, NameRequest::new(name))
                .await?
                .into_result()
        })
    }
}
