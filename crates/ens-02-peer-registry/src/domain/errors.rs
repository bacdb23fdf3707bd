//! Relay errors and relay outcomes.

use crate::domain::config::ConfigError;
use shared_types::PeerId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(std::io::Error),
}

/// Why the relay did not deliver a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    Malformed,
    /// A response without a `clientId` to route it by.
    UnroutableResponse,
    /// The addressed peer is not connected.
    UnknownTarget(PeerId),
    /// The maestro sent a request expecting a relayed response.
    ProtocolViolation,
    /// No connected maestro; a request was answered with an error envelope.
    MaestroUnavailable,
}

/// What the relay did with one inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// A response was routed point-to-point.
    RoutedResponse { to: PeerId },
    /// A non-maestro message was forwarded to the maestro.
    ForwardedToMaestro { maestro: PeerId },
    /// A maestro notification was fanned out.
    Broadcast { recipients: usize },
    Dropped(DropReason),
}
