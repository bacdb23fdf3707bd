//! # `RpcEnvelope`
//!
//! The single wire message exchanged between peers and the relay: a JSON-RPC
//! 2.0 object with one protocol extension, `clientId`.
//!
//! | Shape        | `method` | `id` | `result` / `error` |
//! |--------------|----------|------|--------------------|
//! | Request      | yes      | yes  | no                 |
//! | Notification | yes      | no   | no                 |
//! | Response     | no       | yes  | one of them        |
//!
//! `clientId` is set by the sending peer to its own [`PeerId`]. The relay uses
//! it to route responses point-to-point and to exclude the origin from
//! broadcast fan-out.

use crate::errors::EnvelopeError;
use crate::peer::PeerId;
use crate::CorrelationId;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Protocol version carried in every envelope.
pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC 2.0 error codes plus the server codes used here.
pub mod codes {
    // JSON-RPC 2.0 standard errors (-32700 to -32600)
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;

    // Server errors (-32000 to -32099)
    pub const HANDLER_FAILED: i32 = -32000;
    pub const MAESTRO_UNAVAILABLE: i32 = -32002;
    pub const TIMEOUT: i32 = -32006;
}

/// JSON-RPC request id. Peers generate string ids; numeric ids are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{}", n),
            RequestId::String(s) => f.write_str(s),
        }
    }
}

impl From<CorrelationId> for RequestId {
    fn from(id: CorrelationId) -> Self {
        RequestId::String(id.to_string())
    }
}

/// Which of the three envelope shapes a message has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeKind {
    Request,
    Notification,
    Response,
}

/// JSON-RPC 2.0 envelope with the `clientId` routing extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcEnvelope {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,
    #[serde(rename = "clientId", default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<PeerId>,
}

impl RpcEnvelope {
    fn empty() -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: None,
            params: None,
            id: None,
            result: None,
            error: None,
            client_id: None,
        }
    }

    /// A request expecting a correlated response.
    pub fn request(method: impl Into<String>, params: Value, id: RequestId) -> Self {
        Self {
            method: Some(method.into()),
            params: Some(params),
            id: Some(id),
            ..Self::empty()
        }
    }

    /// A request-shaped message without an id; no response is expected.
    pub fn notification(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: Some(method.into()),
            params: Some(params),
            ..Self::empty()
        }
    }

    /// A successful response. A `null` result is still written out.
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            id: Some(id),
            result: Some(result),
            ..Self::empty()
        }
    }

    /// An error response. `id` is `None` only when the request id was unreadable.
    pub fn failure(id: Option<RequestId>, error: ErrorObject) -> Self {
        Self {
            id,
            error: Some(error),
            ..Self::empty()
        }
    }

    /// Set the routing extension.
    #[must_use]
    pub fn with_client_id(mut self, client_id: PeerId) -> Self {
        self.client_id = Some(client_id);
        self
    }

    /// Classify the envelope. `None` means it is none of the three shapes.
    pub fn kind(&self) -> Option<EnvelopeKind> {
        match (&self.method, &self.id) {
            (Some(_), Some(_)) => Some(EnvelopeKind::Request),
            (Some(_), None) => Some(EnvelopeKind::Notification),
            (None, Some(_)) => Some(EnvelopeKind::Response),
            (None, None) if self.error.is_some() || self.result.is_some() => {
                Some(EnvelopeKind::Response)
            }
            (None, None) => None,
        }
    }

    pub fn is_response(&self) -> bool {
        self.kind() == Some(EnvelopeKind::Response)
    }

    /// Parse and validate an incoming text frame.
    pub fn parse(text: &str) -> Result<Self, EnvelopeError> {
        let envelope: RpcEnvelope =
            serde_json::from_str(text).map_err(|e| EnvelopeError::Malformed(e.to_string()))?;

        if envelope.jsonrpc != JSONRPC_VERSION {
            return Err(EnvelopeError::UnsupportedVersion(envelope.jsonrpc));
        }
        if envelope.kind().is_none() {
            return Err(EnvelopeError::Malformed(
                "envelope has neither method, id, result nor error".into(),
            ));
        }
        Ok(envelope)
    }

    /// Serialize to a text frame.
    pub fn to_text(&self) -> Result<String, EnvelopeError> {
        serde_json::to_string(self).map_err(|e| EnvelopeError::Serialize(e.to_string()))
    }

    /// Collapse a response into its outcome. A missing result reads as `null`.
    pub fn into_outcome(self) -> Result<Value, ErrorObject> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// JSON-RPC error object.
///
/// Deserializes from either the standard `{code, message, data}` object or a
/// bare string, which older peers send for handler failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorObject {
    /// JSON-RPC error code
    pub code: i32,
    /// Error message
    pub message: String,
    /// Optional additional data
    pub data: Option<Value>,
}

impl ErrorObject {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(code: i32, message: impl Into<String>, data: Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Parse error - invalid JSON
    pub fn parse_error(details: impl Into<String>) -> Self {
        Self::new(
            codes::PARSE_ERROR,
            format!("Parse error: {}", details.into()),
        )
    }

    /// Invalid request - not a valid JSON-RPC envelope
    pub fn invalid_request(details: impl Into<String>) -> Self {
        Self::new(
            codes::INVALID_REQUEST,
            format!("Invalid request: {}", details.into()),
        )
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            codes::METHOD_NOT_FOUND,
            format!("Method not found: {}", method),
        )
    }

    pub fn invalid_params(details: impl Into<String>) -> Self {
        Self::new(
            codes::INVALID_PARAMS,
            format!("Invalid params: {}", details.into()),
        )
    }

    pub fn internal(details: impl Into<String>) -> Self {
        Self::new(
            codes::INTERNAL_ERROR,
            format!("Internal error: {}", details.into()),
        )
    }

    /// A handler ran and failed. The message is shown to users verbatim.
    pub fn handler_failed(message: impl Into<String>) -> Self {
        Self::new(codes::HANDLER_FAILED, message)
    }

    pub fn maestro_unavailable() -> Self {
        Self::new(codes::MAESTRO_UNAVAILABLE, "Maestro unavailable")
    }

    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::new(
            codes::TIMEOUT,
            format!("Request timeout: {}", operation.into()),
        )
    }
}

impl fmt::Display for ErrorObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ErrorObject {}

impl From<String> for ErrorObject {
    fn from(message: String) -> Self {
        ErrorObject::handler_failed(message)
    }
}

impl From<&str> for ErrorObject {
    fn from(message: &str) -> Self {
        ErrorObject::handler_failed(message)
    }
}

impl Serialize for ErrorObject {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeStruct;
        let len = if self.data.is_some() { 3 } else { 2 };
        let mut state = serializer.serialize_struct("ErrorObject", len)?;
        state.serialize_field("code", &self.code)?;
        state.serialize_field("message", &self.message)?;
        if let Some(ref data) = self.data {
            state.serialize_field("data", data)?;
        }
        state.end()
    }
}

impl<'de> Deserialize<'de> for ErrorObject {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum ErrorHelper {
            Object {
                code: i32,
                message: String,
                #[serde(default)]
                data: Option<Value>,
            },
            Message(String),
        }

        Ok(match ErrorHelper::deserialize(deserializer)? {
            ErrorHelper::Object {
                code,
                message,
                data,
            } => ErrorObject {
                code,
                message,
                data,
            },
            ErrorHelper::Message(message) => ErrorObject::handler_failed(message),
        })
    }
}
