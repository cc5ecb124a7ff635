//! HTTP+JSON bodies for `POST /name`.

use loginsvc_core::{NameRequest, ServiceError};
use serde::{Deserialize, Serialize};

/// Request body: `{"n": "<name>"}`.
///
/// A missing `n` decodes as the empty name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonNameRequest {
    /// The name to resolve.
    #[serde(default)]
    pub n: String,
}

/// Success body: `{"v": "<id>"}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonNameReply {
    /// The resolved subject id.
    pub v: String,
}

/// Failure body: `{"error": "<message>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Display text of the error.
    pub error: String,
}

impl ErrorEnvelope {
    /// Creates an envelope with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

impl From<&ServiceError> for ErrorEnvelope {
    fn from(error: &ServiceError) -> Self {
        Self::new(error.to_string())
    }
}

impl From<JsonNameRequest> for NameRequest {
    fn from(body: JsonNameRequest) -> Self {
        Self::new(body.n)
    }
}

impl From<NameRequest> for JsonNameRequest {
    fn from(request: NameRequest) -> Self {
        Self { n: request.name }
    }
}

/// Decodes a request body, mapping decoder failures to `Malformed`.
pub fn decode_request(body: &[u8]) -> Result<NameRequest, ServiceError> {
    serde_json::from_slice::<JsonNameRequest>(body)
        .map(NameRequest::from)
        .map_err(|e| ServiceError::malformed(e.to_string()))
}

/// Encodes a request body.
pub fn encode_request(request: &NameRequest) -> Result<Vec<u8>, ServiceError> {
    serde_json::to_vec(&JsonNameRequest {
        n: request.name.clone(),
    })
    .map_err(|e| ServiceError::malformed(e.to_string()))
}
