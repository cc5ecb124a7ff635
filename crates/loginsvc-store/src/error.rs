//! Store errors.

use thiserror::Error;

/// Errors opening a lookup store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The configuration names a backend without the settings it needs.
    #[error("lookup.url is required for the {backend} backend")]
    MissingUrl {
        /// Backend name.
        backend: &'static str,
    },

    /// The database could not be opened.
    #[error("failed to open {url}: {source}")]
    Connect {
        /// Connection URL.
        url: String,
        /// Driver error.
        #[source]
        source: sqlx::Error,
    },

    /// A statement failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Creates a connect error.
    pub fn connect(url: impl Into<String>, source: sqlx::Error) -> Self {
        Self::Connect {
            url: url.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_url_message() {
        let err = StoreError::MissingUrl { backend: "sqlite" };
        assert_eq!(err.to_string(), "lookup.url is required for the sqlite backend");
    }
}
