//! Typed configuration for loginsvc.
//!
//! - TOML and JSON files
//! - `.env` files via `dotenvy`
//! - `LOGINSVC__SECTION__KEY` environment overrides
//! - Strict parsing: unknown fields are errors
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! http_addr = "0.0.0.0:8081"
//! grpc_addr = "0.0.0.0:8082"
//! request_timeout_ms = 30000
//! shutdown_timeout_secs = 30
//!
//! [rate_limit]
//! burst = 1
//! refill_interval_ms = 1000
//!
//! [circuit_breaker]
//! consecutive_failures = 6
//! open_timeout_ms = 60000
//!
//! [lookup]
//! backend = "memory"            # or "sqlite"
//! # url = "sqlite://users.db"   # required for sqlite
//!
//! [lookup.records]
//! ed = "a123456789"
//!
//! [telemetry]
//! service_name = "loginsvc"
//! environment = "production"
//!
//! [telemetry.metrics]
//! enabled = true
//! addr = "0.0.0.0:9090"
//!
//! [telemetry.tracing]
//! enabled = true
//! otlp_endpoint = "http://localhost:4317"
//!
//! [telemetry.logging]
//! level = "info"
//! format = "json"
//! ```
//!
//! # Environment Variable Overrides
//!
//! - `LOGINSVC__SERVER__HTTP_ADDR=0.0.0.0:9000`
//! - `LOGINSVC__RATE_LIMIT__BURST=10`
//! - `LOGINSVC__LOOKUP__RECORDS=ed=a123456789,alice=b987654321`
//! - `LOGINSVC__LOOKUP__BACKEND=sqlite`
//! - `LOGINSVC__LOOKUP__URL=sqlite://users.db`
//! - `LOGINSVC__TELEMETRY__LOGGING__FORMAT=pretty`

#![warn(missing_docs)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::{LoginsvcConfig, LoginsvcConfigBuilder};
pub use error::ConfigError;
pub use loader::{ConfigLoader, ENV_PREFIX};
pub use schema::*;
