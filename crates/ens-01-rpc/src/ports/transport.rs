//! Transport channel port.
//!
//! A duplex text channel to the relay. Outbound text goes through
//! [`TransportChannel::send`]; inbound text and lifecycle changes arrive as
//! [`TransportEvent`]s on the receiver handed out when the transport is
//! created. Events for one channel are delivered in order.

use crate::domain::TransportError;

/// Lifecycle and inbound traffic of a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A connection was (re)established.
    Open,
    /// A text frame arrived.
    Message(String),
    /// An open connection closed.
    Closed,
    /// A connection attempt or an open connection failed.
    Error(String),
}

/// Connection state as observed by senders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Connecting,
    Open,
    /// Waiting out the backoff delay before the next attempt.
    Reconnecting,
    /// Shut down or out of reconnect attempts.
    Closed,
}

/// Outbound side of a transport.
pub trait TransportChannel: Send + Sync {
    /// Send one text frame.
    ///
    /// Fails with [`TransportError::NotOpen`] while disconnected; nothing is
    /// queued for later delivery.
    fn send(&self, text: String) -> Result<(), TransportError>;

    fn state(&self) -> TransportState;

    fn is_open(&self) -> bool {
        self.state() == TransportState::Open
    }
}
