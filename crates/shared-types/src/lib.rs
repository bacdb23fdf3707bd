//! # Shared Types Crate
//!
//! This crate contains the types every Ensemble peer and the relay agree on:
//! the JSON-RPC 2.0 envelope (with the `clientId` routing extension), peer
//! identity, and the hierarchical naming scheme for actions and state keys.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: Anything that crosses a connection is defined here.
//! - **Envelope Routing**: The envelope's `clientId` is the only routing hint the
//!   relay trusts; payloads never carry peer identity of their own.
//! - **Stable Names**: Method names and state keys are derived from a
//!   [`ModuleScope`] so two peers running the same modules agree on them.

pub mod correlation;
pub mod envelope;
pub mod errors;
pub mod humantime_serde;
pub mod keys;
pub mod peer;

pub use correlation::CorrelationId;
pub use envelope::{codes, EnvelopeKind, ErrorObject, RequestId, RpcEnvelope, JSONRPC_VERSION};
pub use errors::EnvelopeError;
pub use keys::{ModuleScope, StateKey, StateKind, ENGINE_SCOPE};
pub use peer::{PeerId, PeerRole, RoleAnnouncement, ROLE_METHOD};
