// @generated
// Checked in from proto/login.proto so builds do not need protoc.
#![allow(missing_docs, clippy::derive_partial_eq_without_eq)]

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NameRequest {
    #[prost(string, tag = "1")]
    pub n: ::prost::alloc::string::String,
}
/// err is empty on success. Error classification does not survive the wire.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NameReply {
    #[prost(string, tag = "1")]
    pub v: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub err: ::prost::alloc::string::String,
}
include!("pb.login.tonic.rs");
