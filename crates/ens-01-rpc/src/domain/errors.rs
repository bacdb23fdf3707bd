//! Transport and call errors.

use shared_types::{EnvelopeError, ErrorObject};
use std::time::Duration;
use thiserror::Error;

/// Failures of the underlying connection.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Not connected; `send` fails fast instead of queueing.
    #[error("Transport not open")]
    NotOpen,

    #[error("Transport closed")]
    Closed,

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Send failed: {0}")]
    Send(String),

    #[error("Receive failed: {0}")]
    Receive(String),
}

/// Outcome of a failed `call`.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CallError {
    #[error("Transport not open")]
    TransportNotOpen,

    #[error("Transport error: {0}")]
    Transport(TransportError),

    /// No response arrived within the call's timeout.
    #[error("Call to {method} timed out after {after:?}")]
    Timeout { method: String, after: Duration },

    /// The connection closed while the call was outstanding.
    #[error("Connection lost before a response arrived")]
    ConnectionLost,

    /// The remote handler failed. Displays the remote message verbatim.
    #[error("{}", .0.message)]
    Remote(ErrorObject),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CallError {
    /// JSON-RPC error object for relaying this failure to another caller.
    pub fn to_error_object(&self) -> ErrorObject {
        match self {
            CallError::Remote(error) => error.clone(),
            CallError::Timeout { method, .. } => ErrorObject::timeout(method.as_str()),
            other => ErrorObject::internal(other.to_string()),
        }
    }
}

impl From<TransportError> for CallError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::NotOpen => CallError::TransportNotOpen,
            other => CallError::Transport(other),
        }
    }
}

impl From<EnvelopeError> for CallError {
    fn from(error: EnvelopeError) -> Self {
        CallError::Serialization(error.to_string())
    }
}
