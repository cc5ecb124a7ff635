//! Test fixtures for loginsvc development and testing.
//!
//! Lookups with observable behavior, used across the workspace's unit and
//! end-to-end tests.
//!
//! # Example
//!
//! ```
//! use loginsvc_core::fixtures::{sample_lookup, CountingLookup};
//! use loginsvc_core::Lookup;
//!
//! let lookup = CountingLookup::new(sample_lookup());
//! assert_eq!(lookup.lookup("ed").unwrap(), "a123456789");
//! assert_eq!(lookup.calls(), 1);
//! ```

use crate::error::LookupError;
use crate::lookup::{Lookup, MemoryLookup};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// The name that resolves in [`sample_lookup`].
pub const SAMPLE_NAME: &str = "ed";

/// The id stored for [`SAMPLE_NAME`].
pub const SAMPLE_ID: &str = "a123456789";

/// Returns the seed records.
#[must_use]
pub fn sample_records() -> Vec<(String, String)> {
    vec![(SAMPLE_NAME.to_string(), SAMPLE_ID.to_string())]
}

/// Returns a lookup holding only `ed -> a123456789`.
#[must_use]
pub fn sample_lookup() -> MemoryLookup {
    MemoryLookup::from_records(sample_records())
}

/// A lookup that counts calls and can be switched into a failing mode.
///
/// Clones share the counter and the switch.
#[derive(Debug, Clone)]
pub struct CountingLookup {
    inner: MemoryLookup,
    calls: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
}

impl CountingLookup {
    /// Wraps `inner`.
    #[must_use]
    pub fn new(inner: MemoryLookup) -> Self {
        Self {
            inner,
            calls: Arc::new(AtomicUsize::new(0)),
            failing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns how many times the lookup has been called.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Makes every following call fail with a backend error (or stop failing).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl Lookup for CountingLookup {
    fn lookup(&self, name: &str) -> Result<String, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(LookupError::backend("backend unavailable"));
        }
        self.inner.lookup(name)
    }
}

/// A lookup whose backend always fails.
#[derive(Debug, Clone)]
pub struct FailingLookup {
    message: String,
}

impl FailingLookup {
    /// Creates a lookup failing with `message`.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Lookup for FailingLookup {
    fn lookup(&self, _name: &str) -> Result<String, LookupError> {
        Err(LookupError::backend(self.message.clone()))
    }
}

/// A lookup that blocks its thread before answering.
#[derive(Debug, Clone)]
pub struct SlowLookup {
    inner: MemoryLookup,
    delay: Duration,
}

impl SlowLookup {
    /// Wraps `inner`, sleeping `delay` on every call.
    #[must_use]
    pub fn new(inner: MemoryLookup, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

impl Lookup for SlowLookup {
    fn lookup(&self, name: &str) -> Result<String, LookupError> {
        std::thread::sleep(self.delay);
        self.inner.lookup(name)
    }
}
