//! Call context types.
//!
//! A [`CallContext`] travels with every call through the middleware pipeline
//! and into the endpoint. It carries the call deadline, the current trace
//! position and call-scoped metadata.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// A unique identifier for each call, using UUID v7.
///
/// UUID v7 is time-ordered, which keeps log correlation cheap.
///
/// # Example
///
/// ```
/// use loginsvc_core::RequestId;
///
/// let id = RequestId::new();
/// assert_eq!(id.to_string().len(), 36);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new unique request ID using UUID v7.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The W3C Trace Context header used for propagation.
pub const TRACEPARENT_HEADER: &str = "traceparent";

/// A position in a distributed trace.
///
/// Serialized on the wire as a W3C `traceparent` value:
/// `{version}-{trace-id}-{span-id}-{flags}`, for example
/// `00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    /// The 128-bit trace ID as 32 lowercase hex characters.
    pub trace_id: String,
    /// The 64-bit span ID as 16 lowercase hex characters.
    pub span_id: String,
    /// Trace flags (sampling, etc.).
    pub flags: TraceFlags,
}

impl TraceContext {
    /// Starts a new trace with a fresh trace ID and span ID.
    #[must_use]
    pub fn new_root() -> Self {
        Self {
            trace_id: generate_trace_id(),
            span_id: generate_span_id(),
            flags: TraceFlags::SAMPLED,
        }
    }

    /// Returns a context in the same trace with a fresh span ID.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            trace_id: self.trace_id.clone(),
            span_id: generate_span_id(),
            flags: self.flags,
        }
    }

    /// Parses a `traceparent` header value.
    ///
    /// Returns `None` for anything that is not a version `00` value with
    /// well-formed, non-zero IDs.
    pub fn parse(value: &str) -> Option<Self> {
        let parts: Vec<&str> = value.trim().split('-').collect();
        if parts.len() != 4 || parts[0] != "00" {
            return None;
        }

        let trace_id = parts[1];
        if !is_hex_id(trace_id, 32) {
            return None;
        }

        let span_id = parts[2];
        if !is_hex_id(span_id, 16) {
            return None;
        }

        let flags = parts[3];
        if flags.len() != 2 {
            return None;
        }
        let flags_byte = u8::from_str_radix(flags, 16).ok()?;

        Some(Self {
            trace_id: trace_id.to_ascii_lowercase(),
            span_id: span_id.to_ascii_lowercase(),
            flags: TraceFlags(flags_byte),
        })
    }

    /// Formats this context as a `traceparent` header value.
    #[must_use]
    pub fn to_traceparent(&self) -> String {
        format!("00-{}-{}-{:02x}", self.trace_id, self.span_id, self.flags.0)
    }
}

fn is_hex_id(id: &str, len: usize) -> bool {
    id.len() == len && id.chars().all(|c| c.is_ascii_hexdigit()) && id.chars().any(|c| c != '0')
}

fn generate_trace_id() -> String {
    Uuid::now_v7().simple().to_string()
}

fn generate_span_id() -> String {
    // The tail of a v7 UUID is the random part.
    Uuid::now_v7().simple().to_string()[16..].to_string()
}

/// Trace flags as defined by W3C Trace Context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceFlags(u8);

impl TraceFlags {
    /// No flags set.
    pub const NONE: Self = Self(0x00);
    /// The trace is sampled.
    pub const SAMPLED: Self = Self(0x01);

    /// Creates flags from the raw byte.
    #[must_use]
    pub const fn new(bits: u8) -> Self {
        Self(bits)
    }

    /// Returns the raw byte.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns true if the sampled flag is set.
    #[must_use]
    pub const fn is_sampled(self) -> bool {
        self.0 & 0x01 != 0
    }
}

/// Per-call context that flows through the middleware pipeline.
///
/// Contexts are cheap to clone; each middleware layer may adjust the copy it
/// passes inward (the tracing layer replaces the trace position, for
/// instance) without affecting outer layers.
///
/// # Example
///
/// ```
/// use loginsvc_core::CallContext;
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let ctx = CallContext::with_timeout(Duration::from_secs(1));
/// assert!(ctx.remaining().is_some());
/// assert!(!ctx.is_expired());
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct CallContext {
    request_id: RequestId,
    deadline: Option<Instant>,
    trace: Option<TraceContext>,
    metadata: HashMap<String, String>,
    started_at: Instant,
}

impl CallContext {
    /// Creates a context with no deadline and no trace.
    #[must_use]
    pub fn new() -> Self {
        Self {
            request_id: RequestId::new(),
            deadline: None,
            trace: None,
            metadata: HashMap::new(),
            started_at: Instant::now(),
        }
    }

    /// Creates a context whose deadline is `timeout` from now.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().deadline_in(timeout)
    }

    /// Returns the request ID.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Sets the deadline to `timeout` from now.
    ///
    /// An existing earlier deadline is kept.
    #[must_use]
    pub fn deadline_in(mut self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        self.deadline = Some(match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        });
        self
    }

    /// Returns the time left before the deadline.
    ///
    /// `None` means no deadline; `Some(Duration::ZERO)` means it has passed.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Returns `true` once the deadline has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.remaining().is_some_and(|left| left.is_zero())
    }

    /// Returns the current trace position.
    #[must_use]
    pub const fn trace(&self) -> Option<&TraceContext> {
        self.trace.as_ref()
    }

    /// Sets the current trace position.
    pub fn set_trace(&mut self, trace: TraceContext) {
        self.trace = Some(trace);
    }

    /// Returns a new context with the specified trace position.
    #[must_use]
    pub fn with_trace(mut self, trace: TraceContext) -> Self {
        self.trace = Some(trace);
        self
    }

    /// Returns the trace ID if a trace is set.
    #[must_use]
    pub fn trace_id(&self) -> Option<&str> {
        self.trace.as_ref().map(|t| t.trace_id.as_str())
    }

    /// Returns a metadata value.
    #[must_use]
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// Inserts a metadata value, replacing any previous one.
    pub fn insert_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// Returns how long ago the context was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl Default for CallContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SAMPLE: &str = "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01";

    #[test]
    fn test_request_id_unique() {
        assert_ne!(RequestId::new(), RequestId::new());
    }

    #[test]
    fn test_parse_traceparent() {
        let context = TraceContext::parse(SAMPLE).unwrap();
        assert_eq!(context.trace_id, "0af7651916cd43dd8448eb211c80319c");
        assert_eq!(context.span_id, "b7ad6b7169203331");
        assert!(context.flags.is_sampled());
        assert_eq!(context.to_traceparent(), SAMPLE);
    }

    #[test]
    fn test_parse_rejects_invalid() {
        assert!(TraceContext::parse("invalid-traceparent").is_none());
        assert!(TraceContext::parse("01-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01").is_none());
        assert!(TraceContext::parse("00-short-b7ad6b7169203331-01").is_none());
        assert!(TraceContext::parse("00-00000000000000000000000000000000-b7ad6b7169203331-01").is_none());
        assert!(TraceContext::parse("00-0af7651916cd43dd8448eb211c80319c-0000000000000000-01").is_none());
        assert!(TraceContext::parse("00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-zz").is_none());
    }

    #[test]
    fn test_parse_unsampled() {
        let context =
            TraceContext::parse("00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-00").unwrap();
        assert!(!context.flags.is_sampled());
        assert_eq!(context.flags, TraceFlags::NONE);
    }

    #[test]
    fn test_new_root_is_well_formed() {
        let root = TraceContext::new_root();
        assert_eq!(root.trace_id.len(), 32);
        assert_eq!(root.span_id.len(), 16);
        assert_eq!(TraceContext::parse(&root.to_traceparent()), Some(root));
    }

    #[test]
    fn test_child_keeps_trace_id() {
        let root = TraceContext::new_root();
        let child = root.child();
        assert_eq!(child.trace_id, root.trace_id);
        assert_ne!(child.span_id, root.span_id);
    }

    #[tokio::test]
    async fn test_context_without_deadline() {
        let ctx = CallContext::new();
        assert!(ctx.deadline().is_none());
        assert!(ctx.remaining().is_none());
        assert!(!ctx.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_expires() {
        let ctx = CallContext::with_timeout(Duration::from_millis(100));
        assert!(!ctx.is_expired());

        tokio::time::advance(Duration::from_millis(150)).await;
        assert!(ctx.is_expired());
        assert_eq!(ctx.remaining(), Some(Duration::ZERO));
    }

    #[tokio::test]
    async fn test_deadline_in_keeps_earlier() {
        let ctx = CallContext::with_timeout(Duration::from_millis(50))
            .deadline_in(Duration::from_secs(60));
        assert!(ctx.remaining().unwrap() <= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_metadata_and_trace() {
        let mut ctx = CallContext::new();
        ctx.insert_metadata("peer", "127.0.0.1:5000");
        assert_eq!(ctx.metadata("peer"), Some("127.0.0.1:5000"));
        assert!(ctx.metadata("missing").is_none());

        let trace = TraceContext::parse(SAMPLE).unwrap();
        ctx.set_trace(trace);
        assert_eq!(ctx.trace_id(), Some("0af7651916cd43dd8448eb211c80319c"));
    }

    proptest! {
        #[test]
        fn parse_never_panics(value in ".*") {
            let _ = TraceContext::parse(&value);
        }

        #[test]
        fn parse_accepts_any_well_formed_value(
            trace in "[0-9a-f]{31}[1-9a-f]",
            span in "[1-9a-f][0-9a-f]{15}",
            flags in any::<u8>(),
        ) {
            let value = format!("00-{trace}-{span}-{flags:02x}");
            let parsed = TraceContext::parse(&value).unwrap();
            prop_assert_eq!(parsed.to_traceparent(), value);
        }
    }
}
