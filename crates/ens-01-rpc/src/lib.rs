//! # RPC Endpoint and Transport Channel (ens-01)
//!
//! The lowest layer of the coordination stack: a reconnecting WebSocket
//! transport to the relay, and a JSON-RPC endpoint on top of it that both
//! serves registered methods and issues calls and notifications.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 RpcEndpoint                  │
//! │  register_method │ call │ notify │ RoleState │
//! │          PendingRequestStore (timeouts)      │
//! └───────────────────────┬──────────────────────┘
//!                         │ TransportChannel + TransportEvent
//!          ┌──────────────┴──────────────┐
//!          │                             │
//!   WsTransport (relay)        InMemoryTransport (tests)
//! ```
//!
//! ## Failure semantics
//!
//! - `call` while disconnected fails with [`CallError::TransportNotOpen`].
//! - `notify` while disconnected returns `false` and sends nothing.
//! - Closing the connection fails every outstanding call with
//!   [`CallError::ConnectionLost`]; calls that see no response time out.
//! - Handler errors travel back as JSON-RPC error objects and surface as
//!   [`CallError::Remote`].
//! - Malformed inbound envelopes are dropped.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod adapters;
pub mod domain;
pub mod endpoint;
pub mod ports;
pub mod role;

pub use adapters::{InMemoryTransport, MemoryTransportHandle, WsTransport};
pub use domain::{
    CallError, ConfigError, EndpointConfig, PendingRequestStore, ReconnectConfig,
    TransportConfig, TransportError,
};
pub use endpoint::{CallContext, MethodHandler, RpcEndpoint};
pub use ports::{TransportChannel, TransportEvent, TransportState};
pub use role::RoleState;

use shared_types::PeerRole;
use std::sync::Arc;

/// Connect to the relay and start an endpoint on the connection.
///
/// The endpoint starts in the role the peer asks for and follows the relay's
/// announcements from then on.
pub fn connect(
    transport_config: TransportConfig,
    endpoint_config: EndpointConfig,
) -> Result<(Arc<RpcEndpoint>, Arc<WsTransport>), ConfigError> {
    endpoint_config.validate()?;
    let peer_id = transport_config.peer_id.clone();
    let initial_role = PeerRole::from_flag(transport_config.is_maestro);

    let (transport, events) = WsTransport::connect(transport_config)?;
    let endpoint = RpcEndpoint::spawn(
        peer_id,
        transport.clone(),
        events,
        endpoint_config,
        initial_role,
    );
    Ok((endpoint, transport))
}
