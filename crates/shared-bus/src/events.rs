//! # Coordination Events
//!
//! Defines all event types that flow through the shared bus. These are local
//! observations (a peer joined, the maestro changed, a state key moved) and
//! never cross a connection.

use serde::{Deserialize, Serialize};
use shared_types::{PeerId, StateKey};

/// All events that can be published to the event bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CoordinationEvent {
    // =========================================================================
    // PEER REGISTRY
    // =========================================================================
    /// A peer completed the WebSocket upgrade and was registered.
    PeerConnected {
        peer_id: PeerId,
        /// Whether the peer asked to be maestro.
        is_maestro: bool,
    },

    /// A peer's connection closed and its entry was removed.
    PeerDisconnected(PeerId),

    /// A peer became the maestro (first connection or explicit claim).
    MaestroAssigned(PeerId),

    /// The maestro disconnected.
    MaestroLost {
        previous: PeerId,
        /// Set when the loss policy promoted another peer.
        promoted: Option<PeerId>,
    },

    // =========================================================================
    // SHARED STATE
    // =========================================================================
    /// A cached state value changed.
    StateChanged {
        key: StateKey,
        /// Peer that wrote the value; `None` for local writes.
        origin: Option<PeerId>,
    },

    // =========================================================================
    // ACTIONS
    // =========================================================================
    /// An action invocation failed and the error was surfaced to the user.
    ActionFailed {
        method: String,
        message: String,
    },
}

impl CoordinationEvent {
    /// Get the topic for this event (for filtering).
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::PeerConnected { .. }
            | Self::PeerDisconnected(_)
            | Self::MaestroAssigned(_)
            | Self::MaestroLost { .. } => EventTopic::Registry,
            Self::StateChanged { .. } => EventTopic::State,
            Self::ActionFailed { .. } => EventTopic::Actions,
        }
    }

    /// Name of the component that emits this event.
    #[must_use]
    pub fn source(&self) -> &'static str {
        match self.topic() {
            EventTopic::Registry => "peer-registry",
            EventTopic::State => "shared-state",
            EventTopic::Actions | EventTopic::All => "action-dispatch",
        }
    }
}

/// Event topics for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Connection and maestro changes.
    Registry,
    /// Shared state cache changes.
    State,
    /// Action failures.
    Actions,
    /// All events (no filtering).
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self { topics }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &CoordinationEvent) -> bool {
        self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic())
    }
}
