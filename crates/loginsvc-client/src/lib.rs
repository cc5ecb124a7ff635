//! # Loginsvc Client
//!
//! Client stubs that make a remote loginsvc look like a local
//! [`NameService`](loginsvc_core::NameService).
//!
//! ```no_run
//! use loginsvc_client::{connect, ClientConfig, Target};
//! use loginsvc_core::{CallContext, NameService};
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = connect(&Target::Grpc("localhost:8082".into()), &ClientConfig::default()).await?;
//! let id = client
//!     .resolve(CallContext::with_timeout(Duration::from_secs(5)), "ed".into())
//!     .await?;
//! println!("sid: {id}");
//! # Ok(())
//! # }
//! ```
//!
//! Errors differ in kind by transport. Over HTTP a failure arrives as
//! `Transport` with the server's message; over gRPC a business error arrives
//! as `Remote`. Their `Display` text is the same either way.

#![doc(html_root_url = "https://docs.rs/loginsvc-client/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
pub mod grpc;
pub mod http;
mod stub;

pub use error::ClientError;
pub use grpc::{GrpcNameEndpoint, DEFAULT_DIAL_TIMEOUT};
pub use http::HttpNameEndpoint;
pub use stub::{
    client_pipeline, connect, grpc_client, http_client, ClientConfig, NameClient, Target,
    OPERATION,
};
