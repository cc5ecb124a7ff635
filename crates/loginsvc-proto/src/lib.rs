//! # Loginsvc Proto
//!
//! Wire formats for the `Name` operation.
//!
//! | Transport | Request | Success | Failure |
//! |-----------|---------|---------|---------|
//! | HTTP `POST /name` | `{"n": ..}` | `200 {"v": ..}` | `{"error": ..}` |
//! | gRPC `/pb.Login/Name` | `NameRequest{n}` | `NameReply{v, err: ""}` | `NameReply{v: "", err}` |
//!
//! The gRPC reply carries errors as a bare string. A client decoding a
//! non-empty `err` gets [`ServiceError::Remote`] with that exact message;
//! the server-side classification is not recoverable.

#![doc(html_root_url = "https://docs.rs/loginsvc-proto/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod json;
mod metadata;
#[allow(clippy::all, clippy::pedantic, clippy::nursery)]
pub mod pb;

pub use metadata::{MetadataExtractor, MetadataInjector};
pub use pb::login_client::LoginClient;
pub use pb::login_server::{Login, LoginServer};

use loginsvc_core::{NameRequest, NameResponse, ServiceError};

/// Path of the single HTTP route.
pub const NAME_PATH: &str = "/name";

/// Full gRPC method path.
pub const GRPC_NAME_METHOD: &str = "/pb.Login/Name";

impl From<pb::NameRequest> for NameRequest {
    fn from(request: pb::NameRequest) -> Self {
        Self::new(request.n)
    }
}

impl From<NameRequest> for pb::NameRequest {
    fn from(request: NameRequest) -> Self {
        Self { n: request.name }
    }
}

impl From<NameResponse> for pb::NameReply {
    fn from(response: NameResponse) -> Self {
        Self {
            v: response.value,
            err: response.error.map(|e| e.to_string()).unwrap_or_default(),
        }
    }
}

impl From<pb::NameReply> for NameResponse {
    fn from(reply: pb::NameReply) -> Self {
        if reply.err.is_empty() {
            Self::found(reply.v)
        } else {
            Self {
                value: reply.v,
                error: Some(ServiceError::remote(reply.err)),
            }
        }
    }
}
