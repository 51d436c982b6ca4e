//! Error types for the chat wire protocol.

use thiserror::Error;

/// Errors raised while encoding or decoding wire records.
#[derive(Debug, Error)]
pub enum ProtoError {
    /// A record could not be serialized.
    #[error("encode error: {0}")]
    Encode(#[source] serde_json::Error),

    /// A payload was not a well-formed record.
    #[error("decode error: {0}")]
    Decode(#[source] serde_json::Error),

    /// A required field was empty.
    #[error("{0} is required")]
    MissingField(&'static str),
}
