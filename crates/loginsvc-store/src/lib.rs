//! Lookup stores for loginsvc.
//!
//! [`open`] builds the [`Lookup`] collaborator named by the `[lookup]`
//! configuration section:
//!
//! | `backend` | Store |
//! |-----------|-------|
//! | `memory` | [`MemoryLookup`] seeded from `records` |
//! | `sqlite` | [`SqlLookup`] on `url`, table `users (name, sid)` |

#![warn(missing_docs)]

mod error;
mod sql;

use std::sync::Arc;

use loginsvc_config::{LookupBackend, LookupConfig};
use loginsvc_core::{Lookup, MemoryLookup};

pub use error::StoreError;
pub use sql::SqlLookup;

/// Opens the store described by `config`.
pub async fn open(config: &LookupConfig) -> Result<Arc<dyn Lookup>, StoreError> {
    match config.backend {
        LookupBackend::Memory => {
            let lookup = MemoryLookup::from_records(config.records.clone());
            tracing::info!(records = lookup.len(), "in-memory lookup seeded");
            Ok(Arc::new(lookup))
        }
        LookupBackend::Sqlite => {
            let url = config
                .url
                .as_deref()
                .ok_or(StoreError::MissingUrl { backend: "sqlite" })?;
            let lookup = SqlLookup::connect(url).await?;
            tracing::info!(%url, "sqlite lookup opened");
            Ok(Arc::new(lookup))
        }
    }
}
