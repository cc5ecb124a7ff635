//! Rate limiting middleware.
//!
//! A token bucket shared by every call through one pipeline. The bucket
//! starts full with `burst` tokens and gains one token per
//! `refill_interval`, never exceeding `burst`. A call that finds the bucket
//! empty fails immediately with [`ServiceError::RateLimited`]; the limiter
//! never waits for a token.
//!
//! ## Example
//!
//! ```
//! use loginsvc_middleware::RateLimiter;
//! use std::time::Duration;
//!
//! // One call per second, no bursting.
//! let limiter = RateLimiter::builder()
//!     .burst(1)
//!     .refill_interval(Duration::from_secs(1))
//!     .build();
//! # tokio_test::block_on(async {
//! assert!(limiter.try_acquire());
//! assert!(!limiter.try_acquire());
//! # });
//! ```

use crate::middleware::{Middleware, Next};
use loginsvc_core::{BoxFuture, CallContext, ServiceError, ServiceResult};
use metrics::Counter;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Token bucket rate limiter.
///
/// Clones share the same bucket.
#[derive(Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    bucket: Arc<Mutex<Bucket>>,
    rejected: Counter,
}

/// Configuration for the token bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum number of tokens held at once.
    pub burst: u32,
    /// Time to gain one token.
    pub refill_interval: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            burst: 1,
            refill_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Option<Instant>,
}

/// Builder for [`RateLimiter`].
#[derive(Clone, Default)]
pub struct RateLimitBuilder {
    config: RateLimitConfig,
    rejected: Option<Counter>,
}

impl RateLimitBuilder {
    /// Creates a builder with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the bucket size.
    ///
    /// Default: 1.
    #[must_use]
    pub fn burst(mut self, burst: u32) -> Self {
        self.config.burst = burst;
        self
    }

    /// Sets the time to gain one token.
    ///
    /// Default: 1 second.
    #[must_use]
    pub fn refill_interval(mut self, interval: Duration) -> Self {
        self.config.refill_interval = interval;
        self
    }

    /// Replaces the whole configuration.
    #[must_use]
    pub fn config(mut self, config: RateLimitConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the counter incremented on every rejection.
    #[must_use]
    pub fn rejections(mut self, counter: Counter) -> Self {
        self.rejected = Some(counter);
        self
    }

    /// Builds the limiter with a full bucket.
    #[must_use]
    pub fn build(self) -> RateLimiter {
        RateLimiter {
            bucket: Arc::new(Mutex::new(Bucket {
                tokens: f64::from(self.config.burst),
                last_refill: None,
            })),
            config: self.config,
            rejected: self.rejected.unwrap_or_else(Counter::noop),
        }
    }
}

impl RateLimiter {
    /// Creates a builder.
    #[must_use]
    pub fn builder() -> RateLimitBuilder {
        RateLimitBuilder::new()
    }

    /// Creates a limiter from a configuration.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        RateLimitBuilder::new().config(config).build()
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Takes one token if available.
    pub fn try_acquire(&self) -> bool {
        let now = Instant::now();
        let mut bucket = self.bucket.lock();
        let burst = f64::from(self.config.burst);

        if let Some(last) = bucket.last_refill {
            let interval = self.config.refill_interval.as_secs_f64();
            if interval > 0.0 {
                let gained = now.saturating_duration_since(last).as_secs_f64() / interval;
                bucket.tokens = (bucket.tokens + gained).min(burst);
            } else {
                bucket.tokens = burst;
            }
        }
        bucket.last_refill = Some(now);

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Returns the whole tokens currently available, without refilling.
    #[must_use]
    pub fn available(&self) -> u32 {
        // tokens is clamped to [0, burst]
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let whole = self.bucket.lock().tokens.floor() as u32;
        whole
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .field("bucket", &*self.bucket.lock())
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for RateLimitBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitBuilder")
            .field("config", &self.config)
            .field("rejections", &self.rejected.is_some())
            .finish()
    }
}

impl<Req, Resp> Middleware<Req, Resp> for RateLimiter
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn process<'a>(
        &'a self,
        ctx: CallContext,
        request: Req,
        next: Next<'a, Req, Resp>,
    ) -> BoxFuture<'a, ServiceResult<Resp>> {
        if self.try_acquire() {
            return next.run(ctx, request);
        }

        self.rejected.increment(1);
        tracing::debug!(
            request_id = %ctx.request_id(),
            burst = self.config.burst,
            "call rejected by rate limiter"
        );
        Box::pin(std::future::ready(Err(ServiceError::RateLimited)))
    }
}
