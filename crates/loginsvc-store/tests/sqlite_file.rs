//! SQLite lookup against an on-disk database.

use loginsvc_config::{LookupBackend, LookupConfig};
use loginsvc_core::{CallContext, NameService, Resolver, ServiceError};
use loginsvc_store::{open, SqlLookup};

#[tokio::test(flavor = "multi_thread")]
async fn test_configured_sqlite_store_resolves_through_resolver() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("users.db").display());

    let seed = SqlLookup::connect(&url).await.unwrap();
    seed.ensure_schema().await.unwrap();
    seed.insert("ed", "a123456789").await.unwrap();
    seed.close().await;

    let config = LookupConfig {
        backend: LookupBackend::Sqlite,
        url: Some(url),
        ..LookupConfig::default()
    };
    let resolver = Resolver::from_shared(open(&config).await.unwrap());

    assert_eq!(
        resolver.resolve(CallContext::new(), "ed".to_string()).await,
        Ok("a123456789".to_string())
    );
    assert_eq!(
        resolver.resolve(CallContext::new(), "nobody".to_string()).await,
        Err(ServiceError::NotFound {
            name: "nobody".to_string()
        })
    );
}

#[tokio::test]
async fn test_missing_file_without_create_mode_fails() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("absent.db").display());
    assert!(SqlLookup::connect(&url).await.is_err());
}
