//! # Loginsvc Core
//!
//! Core types and traits for loginsvc, a name resolution service exposed
//! over HTTP+JSON and gRPC behind one middleware pipeline.
//!
//! This crate provides the transport-agnostic pieces:
//!
//! - [`Endpoint`] - One typed operation, `(CallContext, Req) -> Result<Resp>`
//! - [`CallContext`] - Deadline, trace position and call metadata
//! - [`ServiceError`] - Error taxonomy shared by every layer
//! - [`NameService`] / [`Resolver`] - The name resolution operation
//! - [`Lookup`] - The synchronous persistence collaborator
//! - [`Tracer`] / [`Span`] - Abstract distributed tracing
//! - [`propagation`] - `traceparent` injection and extraction

#![doc(html_root_url = "https://docs.rs/loginsvc-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod context;
mod endpoint;
mod error;
pub mod fixtures;
mod lookup;
pub mod propagation;
mod service;
mod tracer;
mod types;

pub use context::{CallContext, RequestId, TraceContext, TraceFlags, TRACEPARENT_HEADER};
pub use endpoint::{BoxEndpoint, BoxFuture, Endpoint, FnEndpoint};
pub use error::{ErrorCategory, LookupError, ServiceError, ServiceResult};
pub use lookup::{Lookup, MemoryLookup};
pub use service::{EndpointService, NameService, ResolveEndpoint, Resolver};
pub use tracer::{NoopTracer, Span, SpanKind, Tracer};
pub use types::{NameRequest, NameResponse, Outcome};
