//! `traceparent` carriers over gRPC request metadata.

use loginsvc_core::propagation::{Extractor, Injector};
use tonic::metadata::{Ascii, MetadataKey, MetadataMap, MetadataValue};

/// Writes propagation fields into outgoing metadata.
#[derive(Debug)]
pub struct MetadataInjector<'a>(pub &'a mut MetadataMap);

impl Injector for MetadataInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        if let (Ok(key), Ok(value)) = (
            MetadataKey::<Ascii>::from_bytes(key.as_bytes()),
            value.parse::<MetadataValue<Ascii>>(),
        ) {
            self.0.insert(key, value);
        }
    }
}

/// Reads propagation fields from incoming metadata.
#[derive(Debug)]
pub struct MetadataExtractor<'a>(pub &'a MetadataMap);

impl Extractor for MetadataExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|value| value.to_str().ok())
    }
}
