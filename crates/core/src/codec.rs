//! bincode helpers shared by the wire types.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Errors raised while encoding or decoding wire types.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("encoding failed: {0}")]
    Encode(#[source] bincode::Error),

    #[error("{0}")]
    Decode(#[source] bincode::Error),
}

/// Encode a value with bincode.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    bincode::serialize(value).map_err(CodecError::Encode)
}

/// Decode a value previously produced by [`encode`].
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    bincode::deserialize(bytes).map_err(CodecError::Decode)
}
