//! Circuit breaker middleware.
//!
//! One breaker guards one logical remote operation and is shared by every
//! concurrent call to it.
//!
//! ## States
//!
//! ```text
//!            trip condition met                  open timeout elapsed
//!  Closed ───────────────────────▶ Open ─────────────────────────────▶ HalfOpen
//!    ▲                              ▲                                     │
//!    │                              └──────── trial call fails ──────────┤
//!    └──────────────────────────────────── trial call succeeds ───────────┘
//! ```
//!
//! - **Closed**: calls pass through; outcomes update the counts. The breaker
//!   trips when consecutive failures reach the threshold, or when a failure
//!   ratio is configured and enough calls were seen to apply it.
//! - **Open**: calls fail with [`ServiceError::Unavailable`] without reaching
//!   the inner endpoint.
//! - **HalfOpen**: a limited number of trial calls (one by default) pass;
//!   the rest are rejected. The trial outcome closes or re-opens the breaker.
//!
//! Every state change starts a new *generation* and clears the counts. An
//! outcome reported for an older generation is ignored, so a slow call that
//! started before a trip cannot close the breaker afterwards.
//!
//! A failure is an endpoint error or a response carrying an error (see
//! [`Outcome`]). A call whose future is dropped before completing counts as a
//! failure.

use crate::middleware::{Middleware, Next};
use loginsvc_core::{BoxFuture, CallContext, Outcome, ServiceError, ServiceResult};
use metrics::Counter;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BreakerState {
    /// Calls pass through.
    Closed,
    /// Calls are rejected.
    Open,
    /// Trial calls decide the next state.
    HalfOpen,
}

impl BreakerState {
    /// Returns the state name used in logs and metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Call counts for the current generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BreakerCounts {
    /// Calls admitted.
    pub requests: u32,
    /// Successful calls.
    pub total_successes: u32,
    /// Failed calls.
    pub total_failures: u32,
    /// Successes since the last failure.
    pub consecutive_successes: u32,
    /// Failures since the last success.
    pub consecutive_failures: u32,
}

impl BreakerCounts {
    fn on_request(&mut self) {
        self.requests = self.requests.saturating_add(1);
    }

    fn on_success(&mut self) {
        self.total_successes = self.total_successes.saturating_add(1);
        self.consecutive_successes = self.consecutive_successes.saturating_add(1);
        self.consecutive_failures = 0;
    }

    fn on_failure(&mut self) {
        self.total_failures = self.total_failures.saturating_add(1);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.consecutive_successes = 0;
    }
}

/// Breaker tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakerSettings {
    /// Name used in the `Unavailable` error, logs and metrics.
    pub name: String,
    /// Trip once this many consecutive failures are seen.
    pub consecutive_failures: u32,
    /// Also trip once this share of calls failed, if set.
    pub failure_ratio: Option<f64>,
    /// Calls required in the generation before the ratio applies.
    pub min_requests: u32,
    /// How long the breaker stays open before allowing a trial.
    pub open_timeout: Duration,
    /// Clear counts this often while closed; never when `None`.
    pub interval: Option<Duration>,
    /// Trial calls admitted while half-open.
    pub half_open_requests: u32,
}

impl BreakerSettings {
    /// Returns the defaults for a breaker named `name`: trip after more than
    /// five consecutive failures, stay open for 60 seconds, one trial call.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            consecutive_failures: 6,
            failure_ratio: None,
            min_requests: 0,
            open_timeout: Duration::from_secs(60),
            interval: None,
            half_open_requests: 1,
        }
    }

    fn ready_to_trip(&self, counts: &BreakerCounts) -> bool {
        if counts.consecutive_failures >= self.consecutive_failures {
            return true;
        }
        match self.failure_ratio {
            Some(ratio) if counts.requests > 0 && counts.requests >= self.min_requests => {
                f64::from(counts.total_failures) / f64::from(counts.requests) >= ratio
            }
            _ => false,
        }
    }
}

/// Callback invoked on every state change with `(name, from, to)`.
pub type StateChangeHook = Arc<dyn Fn(&str, BreakerState, BreakerState) + Send + Sync>;

struct Core {
    state: BreakerState,
    generation: u64,
    counts: BreakerCounts,
    expiry: Option<Instant>,
}

struct Transition {
    from: BreakerState,
    to: BreakerState,
}

struct Shared {
    settings: BreakerSettings,
    core: Mutex<Core>,
    rejected: Counter,
    on_state_change: Option<StateChangeHook>,
}

/// A shared circuit breaker.
///
/// Clones share state.
///
/// # Example
///
/// ```
/// use loginsvc_middleware::{BreakerState, CircuitBreaker};
/// use std::time::Duration;
///
/// let breaker = CircuitBreaker::builder("Name")
///     .open_timeout(Duration::from_secs(30))
///     .build();
/// # tokio_test::block_on(async {
/// assert_eq!(breaker.state(), BreakerState::Closed);
/// # });
/// ```
#[derive(Clone)]
pub struct CircuitBreaker {
    shared: Arc<Shared>,
}

/// Builder for [`CircuitBreaker`].
pub struct CircuitBreakerBuilder {
    settings: BreakerSettings,
    rejected: Option<Counter>,
    on_state_change: Option<StateChangeHook>,
}

impl CircuitBreakerBuilder {
    /// Creates a builder with default settings.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            settings: BreakerSettings::new(name),
            rejected: None,
            on_state_change: None,
        }
    }

    /// Sets the consecutive failure threshold.
    ///
    /// Default: 6.
    #[must_use]
    pub fn consecutive_failures(mut self, threshold: u32) -> Self {
        self.settings.consecutive_failures = threshold;
        self
    }

    /// Trips once `ratio` of at least `min_requests` calls failed.
    #[must_use]
    pub fn failure_ratio(mut self, ratio: f64, min_requests: u32) -> Self {
        self.settings.failure_ratio = Some(ratio);
        self.settings.min_requests = min_requests;
        self
    }

    /// Sets how long the breaker stays open.
    ///
    /// Default: 60 seconds.
    #[must_use]
    pub fn open_timeout(mut self, timeout: Duration) -> Self {
        self.settings.open_timeout = timeout;
        self
    }

    /// Clears counts this often while closed.
    #[must_use]
    pub fn interval(mut self, interval: Duration) -> Self {
        self.settings.interval = Some(interval);
        self
    }

    /// Sets how many trial calls are admitted while half-open.
    ///
    /// Default: 1.
    #[must_use]
    pub fn half_open_requests(mut self, requests: u32) -> Self {
        self.settings.half_open_requests = requests.max(1);
        self
    }

    /// Replaces all settings.
    #[must_use]
    pub fn settings(mut self, settings: BreakerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the counter incremented on every rejection.
    #[must_use]
    pub fn rejections(mut self, counter: Counter) -> Self {
        self.rejected = Some(counter);
        self
    }

    /// Sets a callback invoked on every state change.
    #[must_use]
    pub fn on_state_change<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str, BreakerState, BreakerState) + Send + Sync + 'static,
    {
        self.on_state_change = Some(Arc::new(hook));
        self
    }

    /// Builds a closed breaker.
    #[must_use]
    pub fn build(self) -> CircuitBreaker {
        let expiry = self.settings.interval.map(|i| Instant::now() + i);
        CircuitBreaker {
            shared: Arc::new(Shared {
                settings: self.settings,
                core: Mutex::new(Core {
                    state: BreakerState::Closed,
                    generation: 0,
                    counts: BreakerCounts::default(),
                    expiry,
                }),
                rejected: self.rejected.unwrap_or_else(Counter::noop),
                on_state_change: self.on_state_change,
            }),
        }
    }
}

impl CircuitBreaker {
    /// Creates a builder for a breaker named `name`.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> CircuitBreakerBuilder {
        CircuitBreakerBuilder::new(name)
    }

    /// Creates a breaker from settings.
    #[must_use]
    pub fn new(settings: BreakerSettings) -> Self {
        CircuitBreakerBuilder::new(settings.name.clone())
            .settings(settings)
            .build()
    }

    /// Returns the breaker name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.settings.name
    }

    /// Returns the settings.
    #[must_use]
    pub fn settings(&self) -> &BreakerSettings {
        &self.shared.settings
    }

    /// Returns the current state, applying any elapsed timeout.
    #[must_use]
    pub fn state(&self) -> BreakerState {
        let (state, transition) = {
            let mut core = self.shared.core.lock();
            let transition = self.refresh(&mut core, Instant::now());
            (core.state, transition)
        };
        self.notify(transition);
        state
    }

    /// Returns the counts of the current generation.
    #[must_use]
    pub fn counts(&self) -> BreakerCounts {
        self.shared.core.lock().counts
    }

    /// Admits a call, or rejects it with `Unavailable`.
    fn before_call(&self) -> Result<Permit<'_>, ServiceError> {
        let (admitted, transition) = {
            let mut core = self.shared.core.lock();
            let transition = self.refresh(&mut core, Instant::now());
            let admitted = match core.state {
                BreakerState::Open => None,
                BreakerState::HalfOpen
                    if core.counts.requests >= self.shared.settings.half_open_requests =>
                {
                    None
                }
                _ => {
                    core.counts.on_request();
                    Some(core.generation)
                }
            };
            (admitted, transition)
        };
        self.notify(transition);

        match admitted {
            Some(generation) => Ok(Permit {
                breaker: self,
                generation,
                settled: false,
            }),
            None => Err(ServiceError::unavailable(self.name())),
        }
    }

    fn after_call(&self, generation: u64, success: bool) {
        let transition = {
            let mut core = self.shared.core.lock();
            let now = Instant::now();
            let mut transition = self.refresh(&mut core, now);
            if core.generation == generation {
                let next = if success {
                    self.on_success(&mut core)
                } else {
                    self.on_failure(&mut core)
                };
                if let Some(to) = next {
                    transition = Some(self.set_state(&mut core, to, now));
                }
            }
            transition
        };
        self.notify(transition);
    }

    fn on_success(&self, core: &mut Core) -> Option<BreakerState> {
        core.counts.on_success();
        match core.state {
            BreakerState::HalfOpen
                if core.counts.consecutive_successes >= self.shared.settings.half_open_requests =>
            {
                Some(BreakerState::Closed)
            }
            _ => None,
        }
    }

    fn on_failure(&self, core: &mut Core) -> Option<BreakerState> {
        core.counts.on_failure();
        match core.state {
            BreakerState::Closed if self.shared.settings.ready_to_trip(&core.counts) => {
                Some(BreakerState::Open)
            }
            BreakerState::HalfOpen => Some(BreakerState::Open),
            _ => None,
        }
    }

    /// Applies timeouts: clears closed counts once the interval passes and
    /// moves open to half-open once the open timeout passes.
    fn refresh(&self, core: &mut Core, now: Instant) -> Option<Transition> {
        match (core.state, core.expiry) {
            (BreakerState::Closed, Some(expiry)) if expiry <= now => {
                self.new_generation(core, now);
                None
            }
            (BreakerState::Open, Some(expiry)) if expiry <= now => {
                Some(self.set_state(core, BreakerState::HalfOpen, now))
            }
            _ => None,
        }
    }

    fn set_state(&self, core: &mut Core, to: BreakerState, now: Instant) -> Transition {
        let from = core.state;
        core.state = to;
        self.new_generation(core, now);
        Transition { from, to }
    }

    fn new_generation(&self, core: &mut Core, now: Instant) {
        core.generation = core.generation.wrapping_add(1);
        core.counts = BreakerCounts::default();
        core.expiry = match core.state {
            BreakerState::Closed => self.shared.settings.interval.map(|i| now + i),
            BreakerState::Open => Some(now + self.shared.settings.open_timeout),
            BreakerState::HalfOpen => None,
        };
    }

    fn notify(&self, transition: Option<Transition>) {
        let Some(Transition { from, to }) = transition else {
            return;
        };
        if from == to {
            return;
        }
        match to {
            BreakerState::Open => tracing::warn!(
                breaker = %self.name(),
                from = %from,
                to = %to,
                "circuit breaker opened"
            ),
            _ => tracing::info!(
                breaker = %self.name(),
                from = %from,
                to = %to,
                "circuit breaker state changed"
            ),
        }
        if let Some(hook) = &self.shared.on_state_change {
            hook(self.name(), from, to);
        }
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let core = self.shared.core.lock();
        f.debug_struct("CircuitBreaker")
            .field("settings", &self.shared.settings)
            .field("state", &core.state)
            .field("generation", &core.generation)
            .field("counts", &core.counts)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for CircuitBreakerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerBuilder")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// An admitted call. Reports a failure if dropped without being settled.
struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    settled: bool,
}

impl Permit<'_> {
    fn settle(mut self, success: bool) {
        self.settled = true;
        self.breaker.after_call(self.generation, success);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.after_call(self.generation, false);
        }
    }
}

impl<Req, Resp> Middleware<Req, Resp> for CircuitBreaker
where
    Req: Send + 'static,
    Resp: Outcome + Send + 'static,
{
    fn name(&self) -> &'static str {
        "circuit_breaker"
    }

    fn process<'a>(
        &'a self,
        ctx: CallContext,
        request: Req,
        next: Next<'a, Req, Resp>,
    ) -> BoxFuture<'a, ServiceResult<Resp>> {
        Box::pin(async move {
            let permit = match self.before_call() {
                Ok(permit) => permit,
                Err(error) => {
                    self.shared.rejected.increment(1);
                    tracing::debug!(
                        request_id = %ctx.request_id(),
                        breaker = %self.name(),
                        "call rejected by circuit breaker"
                    );
                    return Err(error);
                }
            };

            let result = next.run(ctx, request).await;
            permit.settle(result.failure().is_none());
            result
        })
    }
}
