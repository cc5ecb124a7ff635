//! The endpoint abstraction.
//!
//! An [`Endpoint`] is one remote operation expressed as a uniform async
//! function `(CallContext, Req) -> Result<Resp, ServiceError>`, independent of
//! any wire transport. Middleware decorates endpoints; transport adapters
//! decode into them and encode out of them; client stubs implement them on top
//! of a network call.

use crate::context::CallContext;
use crate::error::ServiceResult;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A type-erased, shareable endpoint.
pub type BoxEndpoint<Req, Resp> = Arc<dyn Endpoint<Req, Resp>>;

/// One operation with a typed request and response.
///
/// # Example
///
/// ```
/// use loginsvc_core::{CallContext, Endpoint, FnEndpoint, ServiceResult};
///
/// # tokio_test::block_on(async {
/// let echo = FnEndpoint::new(|_ctx: CallContext, req: String| async move {
///     ServiceResult::Ok(req)
/// });
/// let out = echo.call(CallContext::new(), "hi".to_string()).await.unwrap();
/// assert_eq!(out, "hi");
/// # });
/// ```
pub trait Endpoint<Req, Resp>: Send + Sync + 'static {
    /// Invokes the operation.
    fn call(&self, ctx: CallContext, request: Req) -> BoxFuture<'_, ServiceResult<Resp>>;
}

impl<Req, Resp, E> Endpoint<Req, Resp> for Arc<E>
where
    E: Endpoint<Req, Resp> + ?Sized,
{
    fn call(&self, ctx: CallContext, request: Req) -> BoxFuture<'_, ServiceResult<Resp>> {
        (**self).call(ctx, request)
    }
}

/// An endpoint created from an async function.
pub struct FnEndpoint<F> {
    func: F,
}

impl<F> FnEndpoint<F> {
    /// Creates a new function-based endpoint.
    pub const fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F, Fut, Req, Resp> Endpoint<Req, Resp> for FnEndpoint<F>
where
    F: Fn(CallContext, Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ServiceResult<Resp>> + Send + 'static,
{
    fn call(&self, ctx: CallContext, request: Req) -> BoxFuture<'_, ServiceResult<Resp>> {
        Box::pin((self.func)(ctx, request))
    }
}

impl<F> std::fmt::Debug for FnEndpoint<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnEndpoint").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ServiceError;

    #[tokio::test]
    async fn test_fn_endpoint() {
        let double = FnEndpoint::new(|_ctx: CallContext, n: u32| async move { Ok(n * 2) });
        assert_eq!(double.call(CallContext::new(), 21).await, Ok(42));
    }

    #[tokio::test]
    async fn test_boxed_endpoint() {
        let failing: BoxEndpoint<(), ()> = Arc::new(FnEndpoint::new(
            |_ctx: CallContext, (): ()| async move { Err(ServiceError::RateLimited) },
        ));
        let shared = Arc::clone(&failing);
        assert_eq!(
            shared.call(CallContext::new(), ()).await,
            Err(ServiceError::RateLimited)
        );
    }
}
