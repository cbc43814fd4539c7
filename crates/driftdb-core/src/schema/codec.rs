use crate::{
    error::{ErrorClass, ErrorOrigin, InternalError},
    schema::ColumnDescriptor,
    value::Value,
};
use thiserror::Error as ThisError;

///
/// CodecError
/// Per-column encode/decode failures at the schema boundary.
///

#[derive(Debug, ThisError)]
pub enum CodecError {
    #[error("cannot encode value for column \"{column}\": {message}")]
    Encode { column: String, message: String },

    #[error("cannot decode raw value for column \"{column}\": {message}")]
    Decode { column: String, message: String },
}

impl CodecError {
    pub fn encode(column: &ColumnDescriptor, message: impl Into<String>) -> Self {
        Self::Encode {
            column: column.name().to_string(),
            message: message.into(),
        }
    }

    pub fn decode(column: &ColumnDescriptor, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.name().to_string(),
            message: message.into(),
        }
    }
}

impl From<CodecError> for InternalError {
    fn from(err: CodecError) -> Self {
        Self::new(ErrorClass::Internal, ErrorOrigin::Codec, err.to_string())
    }
}

///
/// SchemaCodec
///
/// Translation between the decoded (caller-facing) and raw (storage-native)
/// value spaces, one column at a time. Implementations must be deterministic
/// and side-effect-free: the registry re-encodes and re-decodes values at
/// arbitrary points and relies on stable answers.
///

pub trait SchemaCodec {
    fn encode(&self, value: &Value, column: &ColumnDescriptor) -> Result<Value, CodecError>;

    fn decode(&self, raw: &Value, column: &ColumnDescriptor) -> Result<Value, CodecError>;
}

///
/// PassthroughCodec
///
/// Identity codec for schemas whose decoded and raw spaces coincide.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct PassthroughCodec;

impl SchemaCodec for PassthroughCodec {
    fn encode(&self, value: &Value, _column: &ColumnDescriptor) -> Result<Value, CodecError> {
        Ok(value.clone())
    }

    fn decode(&self, raw: &Value, _column: &ColumnDescriptor) -> Result<Value, CodecError> {
        Ok(raw.clone())
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_round_trips_unchanged() {
        let column = ColumnDescriptor::new("key");
        let value = Value::Text("k".to_string());
        let raw = PassthroughCodec.encode(&value, &column).unwrap();
        assert_eq!(raw, value);
        assert_eq!(PassthroughCodec.decode(&raw, &column).unwrap(), value);
    }

    #[test]
    fn codec_error_maps_to_internal_codec_origin() {
        let column = ColumnDescriptor::new("key");
        let err: InternalError = CodecError::decode(&column, "not text").into();
        assert_eq!(err.class, ErrorClass::Internal);
        assert_eq!(err.origin, ErrorOrigin::Codec);
        assert!(err.message.contains("\"key\""));
    }
}
