//! Trace context propagation across transport carriers.
//!
//! Both transports carry the W3C `traceparent` value: HTTP in a header, gRPC
//! in request metadata. Carriers implement [`Injector`] and [`Extractor`];
//! `http::HeaderMap` is supported here, the gRPC metadata carriers live with
//! the adapters.

use crate::context::{TraceContext, TRACEPARENT_HEADER};
use http::header::{HeaderMap, HeaderName, HeaderValue};

/// Writes propagation fields into an outgoing carrier.
pub trait Injector {
    /// Sets a field, replacing any previous value.
    fn set(&mut self, key: &str, value: String);
}

/// Reads propagation fields from an incoming carrier.
pub trait Extractor {
    /// Returns a field value if present and valid text.
    fn get(&self, key: &str) -> Option<&str>;
}

impl Injector for HeaderMap {
    fn set(&mut self, key: &str, value: String) {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            self.insert(name, value);
        }
    }
}

impl Extractor for HeaderMap {
    fn get(&self, key: &str) -> Option<&str> {
        HeaderMap::get(self, key).and_then(|value| value.to_str().ok())
    }
}

/// Writes `context` into the carrier as a `traceparent` field.
pub fn inject(context: &TraceContext, carrier: &mut dyn Injector) {
    carrier.set(TRACEPARENT_HEADER, context.to_traceparent());
}

/// Reads a `traceparent` field from the carrier.
///
/// Missing or malformed values yield `None`; the caller then starts a new
/// trace.
pub fn extract(carrier: &dyn Extractor) -> Option<TraceContext> {
    carrier.get(TRACEPARENT_HEADER).and_then(TraceContext::parse)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_map_round_trip() {
        let context = TraceContext::new_root();
        let mut headers = HeaderMap::new();
        inject(&context, &mut headers);

        assert!(headers.contains_key(TRACEPARENT_HEADER));
        assert_eq!(extract(&headers), Some(context));
    }

    #[test]
    fn test_extract_missing() {
        assert!(extract(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_extract_malformed() {
        let mut headers = HeaderMap::new();
        headers.insert(TRACEPARENT_HEADER, HeaderValue::from_static("garbage"));
        assert!(extract(&headers).is_none());
    }
}
