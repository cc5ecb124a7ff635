//! SQLite-backed lookup.
//!
//! Reads `SELECT sid FROM users WHERE name = ?`. No row means
//! [`LookupError::NotFound`]; any other driver failure is a backend error.

use std::str::FromStr;

use loginsvc_core::{Lookup, LookupError};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tokio::runtime::Handle;

use crate::error::StoreError;

const NAME_QUERY: &str = "SELECT sid FROM users WHERE name = ?";

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS users (name TEXT PRIMARY KEY, sid TEXT NOT NULL)";

/// Looks names up in a SQLite `users` table.
///
/// [`Lookup::lookup`] blocks the calling thread on the runtime the store was
/// opened on, so it must run on the blocking pool (as the resolver does) and
/// never directly inside async code.
#[derive(Debug, Clone)]
pub struct SqlLookup {
    pool: SqlitePool,
    runtime: Handle,
}

impl SqlLookup {
    /// Opens the database at `url`, e.g. `sqlite://users.db` or
    /// `sqlite::memory:`.
    ///
    /// An in-memory database lives in a single connection, so the pool is
    /// capped at one connection for `:memory:` URLs.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options =
            SqliteConnectOptions::from_str(url).map_err(|e| StoreError::connect(url, e))?;
        let max_connections = if url.contains(":memory:") { 1 } else { 4 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::connect(url, e))?;

        tracing::debug!(%url, max_connections, "sqlite lookup opened");
        Ok(Self {
            pool,
            runtime: Handle::current(),
        })
    }

    /// Creates the `users` table if it does not exist.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    /// Inserts or replaces one record.
    pub async fn insert(&self, name: &str, sid: &str) -> Result<(), StoreError> {
        sqlx::query("INSERT OR REPLACE INTO users (name, sid) VALUES (?, ?)")
            .bind(name)
            .bind(sid)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Looks `name` up without blocking.
    pub async fn find(&self, name: &str) -> Result<String, LookupError> {
        sqlx::query_scalar::<_, String>(NAME_QUERY)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| LookupError::backend(e.to_string()))?
            .ok_or(LookupError::NotFound)
    }

    /// Closes the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl Lookup for SqlLookup {
    fn lookup(&self, name: &str) -> Result<String, LookupError> {
        self.runtime.block_on(self.find(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> SqlLookup {
        let store = SqlLookup::connect("sqlite::memory:").await.unwrap();
        store.ensure_schema().await.unwrap();
        store.insert("ed", "a123456789").await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_find_existing_name() {
        let store = seeded().await;
        assert_eq!(store.find("ed").await, Ok("a123456789".to_string()));
    }

    #[tokio::test]
    async fn test_no_row_is_not_found() {
        let store = seeded().await;
        assert_eq!(store.find("unknown").await, Err(LookupError::NotFound));
    }

    #[tokio::test]
    async fn test_empty_sid_is_found() {
        let store = seeded().await;
        store.insert("ghost", "").await.unwrap();
        assert_eq!(store.find("ghost").await, Ok(String::new()));
    }

    #[tokio::test]
    async fn test_missing_table_is_backend_error() {
        let store = SqlLookup::connect("sqlite::memory:").await.unwrap();
        assert!(matches!(
            store.find("ed").await,
            Err(LookupError::Backend { .. })
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_blocking_lookup_from_blocking_pool() {
        let store = seeded().await;
        let result = tokio::task::spawn_blocking(move || store.lookup("ed"))
            .await
            .unwrap();
        assert_eq!(result, Ok("a123456789".to_string()));
    }

    #[tokio::test]
    async fn test_bad_url_is_connect_error() {
        let result = SqlLookup::connect("postgres://nowhere").await;
        assert!(matches!(result, Err(StoreError::Connect { .. })));
    }
}
