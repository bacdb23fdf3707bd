//! # Peer Registry
//!
//! Server-side map of connected peers to their outbound channels, the single
//! maestro assignment, and the relay algorithm.
//!
//! ## Election
//!
//! The first peer to connect, or any peer connecting with `is_maestro=true`,
//! becomes maestro. A flagged connection overwrites (and demotes) the current
//! maestro. There is never more than one maestro id.
//!
//! ## Relay
//!
//! For every frame received from peer P:
//! 1. A response carrying `clientId` goes to that client only.
//! 2. Anything else from a non-maestro goes to the maestro.
//! 3. From the maestro, a request (has `id`) is a protocol violation and is
//!    dropped; a notification is fanned out to every peer except P and the
//!    envelope's `clientId` (the origin it was sent on behalf of).

use crate::domain::{DropReason, MaestroLossPolicy, RelayOutcome};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::json;
use shared_bus::{CoordinationEvent, EventPublisher};
use shared_types::{
    EnvelopeKind, ErrorObject, PeerId, RoleAnnouncement, RpcEnvelope, ROLE_METHOD,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// One registered connection.
struct PeerHandle {
    outbound: mpsc::UnboundedSender<String>,
    /// Monotonic registration number; lower means connected earlier.
    connection_id: u64,
    connected_at: Instant,
}

/// Result of registering a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub peer_id: PeerId,
    /// Pass back to [`PeerRegistry::unregister`].
    pub connection_id: u64,
    pub is_maestro: bool,
}

/// Point-in-time view of one peer.
#[derive(Debug, Clone)]
pub struct PeerSnapshot {
    pub peer_id: PeerId,
    pub is_maestro: bool,
    pub connected_for: std::time::Duration,
}

pub struct PeerRegistry {
    peers: DashMap<PeerId, PeerHandle>,
    maestro: RwLock<Option<PeerId>>,
    policy: MaestroLossPolicy,
    next_connection_id: AtomicU64,
    bus: Arc<dyn EventPublisher>,
}

impl PeerRegistry {
    pub fn new(policy: MaestroLossPolicy, bus: Arc<dyn EventPublisher>) -> Self {
        Self {
            peers: DashMap::new(),
            maestro: RwLock::new(None),
            policy,
            next_connection_id: AtomicU64::new(1),
            bus,
        }
    }

    pub fn policy(&self) -> MaestroLossPolicy {
        self.policy
    }

    /// The maestro id, connected or not.
    pub fn maestro(&self) -> Option<PeerId> {
        self.maestro.read().clone()
    }

    /// The maestro id if that peer is currently connected.
    pub fn connected_maestro(&self) -> Option<PeerId> {
        self.maestro().filter(|id| self.peers.contains_key(id))
    }

    pub fn is_maestro(&self, peer_id: &PeerId) -> bool {
        self.maestro.read().as_ref() == Some(peer_id)
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn is_connected(&self, peer_id: &PeerId) -> bool {
        self.peers.contains_key(peer_id)
    }

    pub fn snapshot(&self) -> Vec<PeerSnapshot> {
        let maestro = self.maestro();
        let mut peers: Vec<(u64, PeerSnapshot)> = self
            .peers
            .iter()
            .map(|entry| {
                (
                    entry.connection_id,
                    PeerSnapshot {
                        peer_id: entry.key().clone(),
                        is_maestro: maestro.as_ref() == Some(entry.key()),
                        connected_for: entry.connected_at.elapsed(),
                    },
                )
            })
            .collect();
        peers.sort_by_key(|(connection_id, _)| *connection_id);
        peers.into_iter().map(|(_, snapshot)| snapshot).collect()
    }

    /// Register a new connection and run the election.
    ///
    /// A blank `requested_id` gets a generated timestamp id, made unique if
    /// it collides. A supplied id that is already registered replaces the
    /// old connection (a reconnect).
    pub fn register(
        &self,
        requested_id: Option<&str>,
        claims_maestro: bool,
        outbound: mpsc::UnboundedSender<String>,
    ) -> Registration {
        let peer_id = self.resolve_peer_id(requested_id);
        let connection_id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);

        let replaced = self.peers.insert(
            peer_id.clone(),
            PeerHandle {
                outbound,
                connection_id,
                connected_at: Instant::now(),
            },
        );
        if replaced.is_some() {
            info!(peer_id = %peer_id, "Peer reconnected, replacing previous connection");
        }

        let (is_maestro, demoted, assigned) = {
            let mut maestro = self.maestro.write();
            let current = maestro.clone();
            match current {
                Some(current) if current == peer_id => (true, None, false),
                _ if claims_maestro => {
                    let demoted = maestro.replace(peer_id.clone());
                    (true, demoted, true)
                }
                None => {
                    *maestro = Some(peer_id.clone());
                    (true, None, true)
                }
                Some(_) => (false, None, false),
            }
        };

        info!(
            peer_id = %peer_id,
            is_maestro = is_maestro,
            peers = self.peers.len(),
            "Peer connected"
        );
        self.bus.publish(CoordinationEvent::PeerConnected {
            peer_id: peer_id.clone(),
            is_maestro: claims_maestro,
        });

        if let Some(demoted) = demoted {
            info!(previous = %demoted, maestro = %peer_id, "Maestro overwritten by flagged peer");
            self.announce_role(&demoted, false);
        }
        if assigned {
            self.bus
                .publish(CoordinationEvent::MaestroAssigned(peer_id.clone()));
        }
        self.announce_role(&peer_id, is_maestro);

        Registration {
            peer_id,
            connection_id,
            is_maestro,
        }
    }

    /// Remove a connection. Ignored if the id was re-registered since.
    pub fn unregister(&self, peer_id: &PeerId, connection_id: u64) -> bool {
        let removed = self
            .peers
            .remove_if(peer_id, |_, handle| handle.connection_id == connection_id)
            .is_some();
        if !removed {
            debug!(peer_id = %peer_id, "Stale connection closed, registry unchanged");
            return false;
        }

        info!(peer_id = %peer_id, peers = self.peers.len(), "Peer disconnected");
        self.bus
            .publish(CoordinationEvent::PeerDisconnected(peer_id.clone()));

        if self.is_maestro(peer_id) {
            self.handle_maestro_loss(peer_id);
        }
        true
    }

    fn handle_maestro_loss(&self, previous: &PeerId) {
        let promoted = match self.policy {
            MaestroLossPolicy::Reject => {
                warn!(
                    maestro = %previous,
                    "Maestro disconnected; requests are rejected until it reconnects"
                );
                None
            }
            MaestroLossPolicy::PromoteNext => {
                let mut maestro = self.maestro.write();
                // Still ours to replace, unless a flagged peer raced in.
                if maestro.as_ref() != Some(previous) {
                    return;
                }
                let next = self
                    .peers
                    .iter()
                    .min_by_key(|entry| entry.connection_id)
                    .map(|entry| entry.key().clone());
                *maestro = next.clone();
                next
            }
        };

        self.bus.publish(CoordinationEvent::MaestroLost {
            previous: previous.clone(),
            promoted: promoted.clone(),
        });

        match promoted {
            Some(next) => {
                info!(previous = %previous, maestro = %next, "Promoted new maestro");
                self.announce_role(&next, true);
                self.bus.publish(CoordinationEvent::MaestroAssigned(next));
            }
            None if self.policy == MaestroLossPolicy::PromoteNext => {
                warn!(previous = %previous, "Maestro disconnected and no peer is left to promote");
            }
            None => {}
        }
    }

    /// Relay one text frame received from `from`.
    pub fn relay(&self, from: &PeerId, text: &str) -> RelayOutcome {
        let mut envelope = match RpcEnvelope::parse(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!(peer_id = %from, error = %e, "Dropping malformed frame");
                return RelayOutcome::Dropped(DropReason::Malformed);
            }
        };

        let Some(kind) = envelope.kind() else {
            return RelayOutcome::Dropped(DropReason::Malformed);
        };

        if kind == EnvelopeKind::Response {
            return self.route_response(from, &envelope, text);
        }

        if !self.is_maestro(from) {
            let text = if envelope.client_id.is_none() {
                envelope.client_id = Some(from.clone());
                match envelope.to_text() {
                    Ok(stamped) => stamped,
                    Err(_) => return RelayOutcome::Dropped(DropReason::Malformed),
                }
            } else {
                text.to_string()
            };
            return self.forward_to_maestro(from, &envelope, kind, text);
        }

        if kind == EnvelopeKind::Request {
            warn!(
                peer_id = %from,
                method = envelope.method.as_deref().unwrap_or_default(),
                "Protocol violation: maestro sent a request to the relay"
            );
            return RelayOutcome::Dropped(DropReason::ProtocolViolation);
        }

        let recipients = self.broadcast(from, envelope.client_id.as_ref(), text);
        debug!(
            peer_id = %from,
            method = envelope.method.as_deref().unwrap_or_default(),
            recipients = recipients,
            "Broadcast notification"
        );
        RelayOutcome::Broadcast { recipients }
    }

    fn route_response(&self, from: &PeerId, envelope: &RpcEnvelope, text: &str) -> RelayOutcome {
        let Some(target) = envelope.client_id.clone() else {
            warn!(peer_id = %from, id = ?envelope.id, "Response without clientId, cannot route");
            return RelayOutcome::Dropped(DropReason::UnroutableResponse);
        };

        if self.send_to(&target, text.to_string()) {
            debug!(from = %from, to = %target, id = ?envelope.id, "Routed response");
            RelayOutcome::RoutedResponse { to: target }
        } else {
            debug!(from = %from, to = %target, "Response target not connected");
            RelayOutcome::Dropped(DropReason::UnknownTarget(target))
        }
    }

    fn forward_to_maestro(
        &self,
        from: &PeerId,
        envelope: &RpcEnvelope,
        kind: EnvelopeKind,
        text: String,
    ) -> RelayOutcome {
        let method = envelope.method.as_deref().unwrap_or_default();

        if let Some(maestro) = self.connected_maestro() {
            if self.send_to(&maestro, text) {
                debug!(from = %from, maestro = %maestro, method = method, "Forwarded to maestro");
                return RelayOutcome::ForwardedToMaestro { maestro };
            }
        }

        if kind == EnvelopeKind::Request {
            warn!(from = %from, method = method, "Maestro unavailable, rejecting request");
            let rejection = RpcEnvelope::failure(envelope.id.clone(), ErrorObject::maestro_unavailable())
                .with_client_id(from.clone());
            if let Ok(text) = rejection.to_text() {
                self.send_to(from, text);
            }
        } else {
            warn!(from = %from, method = method, "Maestro unavailable, dropping notification");
        }
        RelayOutcome::Dropped(DropReason::MaestroUnavailable)
    }

    /// Send to every peer except `from` and `origin`. Returns the recipient count.
    pub fn broadcast(&self, from: &PeerId, origin: Option<&PeerId>, text: &str) -> usize {
        let mut recipients = 0;
        for entry in self.peers.iter() {
            let peer_id = entry.key();
            if peer_id == from || Some(peer_id) == origin {
                continue;
            }
            if entry.outbound.send(text.to_string()).is_ok() {
                recipients += 1;
            }
        }
        recipients
    }

    /// Queue a frame for one peer. Returns false if it is not connected.
    pub fn send_to(&self, peer_id: &PeerId, text: String) -> bool {
        self.peers
            .get(peer_id)
            .map(|handle| handle.outbound.send(text).is_ok())
            .unwrap_or(false)
    }

    fn announce_role(&self, peer_id: &PeerId, is_maestro: bool) {
        let announcement = RoleAnnouncement {
            client_id: peer_id.clone(),
            is_maestro,
        };
        let params = serde_json::to_value(&announcement).unwrap_or_else(|_| json!({}));
        match RpcEnvelope::notification(ROLE_METHOD, params).to_text() {
            Ok(text) => {
                self.send_to(peer_id, text);
            }
            Err(e) => warn!(peer_id = %peer_id, error = %e, "Failed to encode role announcement"),
        }
    }

    fn resolve_peer_id(&self, requested_id: Option<&str>) -> PeerId {
        let supplied = requested_id.map(str::trim).filter(|id| !id.is_empty());
        if let Some(id) = supplied {
            return PeerId::from(id);
        }

        let base = PeerId::generate();
        if !self.peers.contains_key(&base) {
            return base;
        }
        (1u32..)
            .map(|n| PeerId::new(format!("{}-{}", base, n)))
            .find(|candidate| !self.peers.contains_key(candidate))
            .unwrap_or(base)
    }
}
