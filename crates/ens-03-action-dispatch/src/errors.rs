//! Action errors.

use ens_01_rpc::CallError;
use shared_types::ErrorObject;
use std::fmt;
use thiserror::Error;

/// Failure returned by an action handler. The message is shown to users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError(String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for HandlerError {}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

impl From<HandlerError> for ErrorObject {
    fn from(error: HandlerError) -> Self {
        ErrorObject::handler_failed(error.0)
    }
}

/// Why an action call failed.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ActionError {
    /// The handler ran (locally or on the maestro) and failed.
    #[error("{0}")]
    Failed(String),

    /// The call never reached a handler.
    #[error(transparent)]
    Call(CallError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ActionError {
    /// Message handed to the error notifier.
    pub fn user_message(&self) -> String {
        match self {
            ActionError::Failed(message) => message.clone(),
            ActionError::Call(CallError::TransportNotOpen) => "Not connected".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<CallError> for ActionError {
    fn from(error: CallError) -> Self {
        match error {
            CallError::Remote(remote) => ActionError::Failed(remote.message),
            other => ActionError::Call(other),
        }
    }
}

impl From<serde_json::Error> for ActionError {
    fn from(error: serde_json::Error) -> Self {
        ActionError::Serialization(error.to_string())
    }
}
