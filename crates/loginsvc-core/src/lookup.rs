//! The persistence collaborator.

use crate::error::LookupError;
use std::collections::HashMap;
use std::sync::Arc;

/// Synchronous name to id lookup against a backing store.
///
/// Implementations may block; callers run them on the blocking pool.
pub trait Lookup: Send + Sync + 'static {
    /// Returns the id stored for `name`.
    ///
    /// Absence is reported as [`LookupError::NotFound`].
    fn lookup(&self, name: &str) -> Result<String, LookupError>;
}

impl<L: Lookup + ?Sized> Lookup for Arc<L> {
    fn lookup(&self, name: &str) -> Result<String, LookupError> {
        (**self).lookup(name)
    }
}

/// An in-memory lookup table.
///
/// # Example
///
/// ```
/// use loginsvc_core::{Lookup, LookupError, MemoryLookup};
///
/// let lookup = MemoryLookup::from_records([("ed", "a123456789")]);
/// assert_eq!(lookup.lookup("ed").unwrap(), "a123456789");
/// assert_eq!(lookup.lookup("bob"), Err(LookupError::NotFound));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryLookup {
    records: HashMap<String, String>,
}

impl MemoryLookup {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table from name/id pairs.
    pub fn from_records<I, K, V>(records: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            records: records
                .into_iter()
                .map(|(name, id)| (name.into(), id.into()))
                .collect(),
        }
    }

    /// Adds or replaces a record.
    #[must_use]
    pub fn with_record(mut self, name: impl Into<String>, id: impl Into<String>) -> Self {
        self.records.insert(name.into(), id.into());
        self
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if the table holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Lookup for MemoryLookup {
    fn lookup(&self, name: &str) -> Result<String, LookupError> {
        self.records.get(name).cloned().ok_or(LookupError::NotFound)
    }
}
