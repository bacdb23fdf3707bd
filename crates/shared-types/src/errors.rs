//! # Error Types
//!
//! Errors raised while reading or writing wire envelopes.

use thiserror::Error;

/// Errors related to envelope decoding and encoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    /// Text is not JSON, or not an envelope of any known shape.
    #[error("Malformed envelope: {0}")]
    Malformed(String),

    /// `jsonrpc` is not "2.0".
    #[error("Unsupported JSON-RPC version: {0}")]
    UnsupportedVersion(String),

    /// Envelope could not be encoded.
    #[error("Serialization failed: {0}")]
    Serialize(String),
}
