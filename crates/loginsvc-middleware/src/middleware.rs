//! Core middleware trait and types.
//!
//! This module defines the [`Middleware`] trait that all pipeline stages
//! implement. A middleware receives the call context, the typed request and a
//! [`Next`] handle to the rest of the chain, and returns the same result type
//! the endpoint does, so every layer preserves the endpoint's signature.
//!
//! # Example
//!
//! ```
//! use loginsvc_core::{BoxFuture, CallContext, ServiceResult};
//! use loginsvc_middleware::{Middleware, Next};
//!
//! struct Passthrough;
//!
//! impl Middleware<String, String> for Passthrough {
//!     fn name(&self) -> &'static str {
//!         "passthrough"
//!     }
//!
//!     fn process<'a>(
//!         &'a self,
//!         ctx: CallContext,
//!         request: String,
//!         next: Next<'a, String, String>,
//!     ) -> BoxFuture<'a, ServiceResult<String>> {
//!         next.run(ctx, request)
//!     }
//! }
//! ```

use loginsvc_core::{BoxFuture, CallContext, Endpoint, ServiceResult};

/// The core middleware trait.
///
/// # Invariants
///
/// - Middleware calls `next.run()` at most once
/// - Middleware that short-circuits never reaches the endpoint
/// - Errors from inner layers are passed through unchanged
pub trait Middleware<Req, Resp>: Send + Sync + 'static {
    /// Returns the stage name used in logs and debugging.
    fn name(&self) -> &'static str;

    /// Processes the call through this layer.
    fn process<'a>(
        &'a self,
        ctx: CallContext,
        request: Req,
        next: Next<'a, Req, Resp>,
    ) -> BoxFuture<'a, ServiceResult<Resp>>;
}

/// Handle to the remainder of the chain.
///
/// Consumed by [`Next::run`], so it can only be invoked once.
pub struct Next<'a, Req, Resp> {
    inner: NextInner<'a, Req, Resp>,
}

enum NextInner<'a, Req, Resp> {
    /// More middleware to process
    Chain {
        middleware: &'a dyn Middleware<Req, Resp>,
        next: Box<Next<'a, Req, Resp>>,
    },
    /// End of chain
    Endpoint(&'a dyn Endpoint<Req, Resp>),
}

impl<'a, Req, Resp> Next<'a, Req, Resp>
where
    Req: 'static,
    Resp: 'static,
{
    /// Creates a `Next` that invokes `middleware`, then `next`.
    pub fn new(middleware: &'a dyn Middleware<Req, Resp>, next: Self) -> Self {
        Self {
            inner: NextInner::Chain {
                middleware,
                next: Box::new(next),
            },
        }
    }

    /// Creates a terminal `Next` that invokes the endpoint.
    pub fn endpoint(endpoint: &'a dyn Endpoint<Req, Resp>) -> Self {
        Self {
            inner: NextInner::Endpoint(endpoint),
        }
    }

    /// Invokes the next middleware or the endpoint.
    pub fn run(self, ctx: CallContext, request: Req) -> BoxFuture<'a, ServiceResult<Resp>> {
        match self.inner {
            NextInner::Chain { middleware, next } => middleware.process(ctx, request, *next),
            NextInner::Endpoint(endpoint) => endpoint.call(ctx, request),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loginsvc_core::ServiceError;
    use std::sync::Mutex;

    struct Recording {
        name: &'static str,
        visits: std::sync::Arc<Mutex<Vec<&'static str>>>,
    }

    impl Middleware<u32, u32> for Recording {
        fn name(&self) -> &'static str {
            self.name
        }

        fn process<'a>(
            &'a self,
            ctx: CallContext,
            request: u32,
            next: Next<'a, u32, u32>,
        ) -> BoxFuture<'a, ServiceResult<u32>> {
            Box::pin(async move {
                self.visits.lock().unwrap().push(self.name);
                next.run(ctx, request + 1).await
            })
        }
    }

    struct Reject;

    impl Middleware<u32, u32> for Reject {
        fn name(&self) -> &'static str {
            "reject"
        }

        fn process<'a>(
            &'a self,
            _ctx: CallContext,
            _request: u32,
            _next: Next<'a, u32, u32>,
        ) -> BoxFuture<'a, ServiceResult<u32>> {
            Box::pin(async { Err(ServiceError::RateLimited) })
        }
    }

    struct Identity;

    impl Endpoint<u32, u32> for Identity {
        fn call(&self, _ctx: CallContext, request: u32) -> BoxFuture<'_, ServiceResult<u32>> {
            Box::pin(async move { Ok(request) })
        }
    }

    #[tokio::test]
    async fn test_next_endpoint() {
        let endpoint = Identity;
        let next = Next::endpoint(&endpoint);
        assert_eq!(next.run(CallContext::new(), 7).await, Ok(7));
    }

    #[tokio::test]
    async fn test_middleware_chain() {
        let visits = std::sync::Arc::new(Mutex::new(Vec::new()));
        let first = Recording {
            name: "first",
            visits: visits.clone(),
        };
        let second = Recording {
            name: "second",
            visits: visits.clone(),
        };
        let endpoint = Identity;

        let next = Next::new(&first, Next::new(&second, Next::endpoint(&endpoint)));
        assert_eq!(next.run(CallContext::new(), 0).await, Ok(2));
        assert_eq!(*visits.lock().unwrap(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_short_circuit_skips_rest() {
        let visits = std::sync::Arc::new(Mutex::new(Vec::new()));
        let after = Recording {
            name: "after",
            visits: visits.clone(),
        };
        let endpoint = Identity;

        let next = Next::new(&Reject, Next::new(&after, Next::endpoint(&endpoint)));
        assert_eq!(
            next.run(CallContext::new(), 0).await,
            Err(ServiceError::RateLimited)
        );
        assert!(visits.lock().unwrap().is_empty());
    }
}
