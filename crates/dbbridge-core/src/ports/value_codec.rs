//! Value codec port
//!
//! Composite bound values are flattened to a single text parameter, and the
//! `driver_options` configuration blob is decoded, through an injected codec
//! so the wire format can be swapped without touching the executor.

use crate::domain::DbError;

/// Port trait for serializing composite values to opaque scalars
pub trait IValueCodec: Send + Sync {
    /// Serializes a composite value to its scalar text form
    fn encode(&self, value: &serde_json::Value) -> Result<String, DbError>;

    /// Parses a scalar text form back into a value
    fn decode(&self, blob: &str) -> Result<serde_json::Value, DbError>;
}

/// JSON codec, the default wire format
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl IValueCodec for JsonCodec {
    fn encode(&self, value: &serde_json::Value) -> Result<String, DbError> {
        Ok(serde_json::to_string(value)?)
    }

    fn decode(&self, blob: &str) -> Result<serde_json::Value, DbError> {
        Ok(serde_json::from_str(blob)?)
    }
}
