use bytes::Bytes;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SerializerError {
    #[error("Encode error: {0}")]
    Encode(String),
    #[error("Decode error: {0}")]
    Decode(String),
}

/// Turns structured trees into bytes and back.
///
/// The engine only ever asks for generic trees; shaping the tree into the
/// declared type happens in the response resolver.
pub trait StructuredSerializer: Send + Sync + fmt::Debug {
    /// Content type announced for structured payloads.
    fn content_type(&self) -> &'static str;

    fn encode(&self, value: &Value) -> Result<Bytes, SerializerError>;

    fn decode_tree(&self, bytes: &[u8]) -> Result<Value, SerializerError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSerializer;

impl StructuredSerializer for JsonSerializer {
    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn encode(&self, value: &Value) -> Result<Bytes, SerializerError> {
        serde_json::to_vec(value)
            .map(Bytes::from)
            .map_err(|e| SerializerError::Encode(e.to_string()))
    }

    fn decode_tree(&self, bytes: &[u8]) -> Result<Value, SerializerError> {
        serde_json::from_slice(bytes).map_err(|e| SerializerError::Decode(e.to_string()))
    }
}
