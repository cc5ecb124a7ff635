//! # Loginsvc Test
//!
//! Runs a real loginsvc (both transports, full pipeline) on ephemeral ports
//! for end-to-end tests.
//!
//! - [`TestServer`] - bound listeners, background serve task, shutdown on drop
//! - Raw access: [`TestServer::post_name`], [`TestServer::grpc_name`]
//! - Stub access: [`TestServer::http_client`], [`TestServer::grpc_client`]

#![doc(html_root_url = "https://docs.rs/loginsvc-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod server;

pub use error::TestError;
pub use server::{TestServer, TestServerBuilder};
