//! # Loginsvc Server
//!
//! Serves the `Name` operation over HTTP+JSON and gRPC. Both adapters share
//! one [`NamePipeline`], so the limiter and breaker see every call no matter
//! which transport it arrived on.
//!
//! ```text
//! HTTP  POST /name ─┐
//!                   ├─▶ Pipeline ─▶ Resolver ─▶ Lookup
//! gRPC  /pb.Login/Name ─┘
//! ```

#![doc(html_root_url = "https://docs.rs/loginsvc-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
pub mod grpc;
pub mod http;
mod pipeline;
mod server;
mod shutdown;

pub use error::ServerError;
pub use grpc::{status_for, GrpcAdapter};
pub use http::HttpAdapter;
pub use pipeline::{server_pipeline, NamePipeline, SharedEndpoint, METHOD, OPERATION};
pub use server::Server;
pub use shutdown::{ConnectionToken, ConnectionTracker, ShutdownReceiver, ShutdownSignal};
