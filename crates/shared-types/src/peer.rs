//! # Peer Identity
//!
//! A [`PeerId`] is an opaque string chosen by the client (and persisted on the
//! client side so reconnects present the same id) or generated by the relay
//! as a millisecond timestamp when the client supplies none.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, connection-stable identifier of a peer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    /// Wrap an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate the `"<timestamp>"` fallback id (milliseconds since epoch).
    pub fn generate() -> Self {
        Self(chrono::Utc::now().timestamp_millis().to_string())
    }

    /// Use the supplied id if it is non-blank, otherwise generate one.
    pub fn from_optional(candidate: Option<&str>) -> Self {
        match candidate.map(str::trim) {
            Some(id) if !id.is_empty() => Self(id.to_string()),
            _ => Self::generate(),
        }
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for PeerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for PeerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Method name of the role notification the relay sends after registration.
pub const ROLE_METHOD: &str = "registry.role";

/// Whether a peer executes authoritative logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerRole {
    /// The single authoritative peer.
    Maestro,
    /// Every other peer; forwards actions to the maestro.
    Follower,
}

impl PeerRole {
    pub fn from_flag(is_maestro: bool) -> Self {
        if is_maestro {
            PeerRole::Maestro
        } else {
            PeerRole::Follower
        }
    }

    pub fn is_maestro(&self) -> bool {
        matches!(self, PeerRole::Maestro)
    }
}

/// Params of the `registry.role` notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleAnnouncement {
    pub client_id: PeerId,
    pub is_maestro: bool,
}
