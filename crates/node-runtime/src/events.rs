//! Logs coordination events published on the in-process bus.

use ensemble_telemetry::log_peer_event;
use shared_bus::{CoordinationEvent, Subscription};
use tracing::{debug, warn};

/// Drain `subscription` into the log until the bus closes.
pub async fn log_coordination_events(mut subscription: Subscription) {
    while let Some(event) = subscription.recv().await {
        let source = event.source();
        match event {
            CoordinationEvent::PeerConnected {
                peer_id,
                is_maestro,
            } => log_peer_event!(info, source, "Peer connected", peer_id, claims_maestro = is_maestro),
            CoordinationEvent::PeerDisconnected(peer_id) => {
                log_peer_event!(info, source, "Peer disconnected", peer_id)
            }
            CoordinationEvent::MaestroAssigned(peer_id) => {
                log_peer_event!(info, source, "Maestro assigned", peer_id)
            }
            CoordinationEvent::MaestroLost { previous, promoted } => log_peer_event!(
                warn,
                source,
                "Maestro lost",
                previous,
                promoted = ?promoted
            ),
            CoordinationEvent::StateChanged { key, origin } => {
                debug!(component = source, key = %key, origin = ?origin, "State changed")
            }
            CoordinationEvent::ActionFailed { method, message } => {
                warn!(component = source, method = %method, message = %message, "Action failed")
            }
        }
    }
    debug!("Event bus closed");
}
