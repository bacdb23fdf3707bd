//! Watchable maestro/follower role of this peer.

use serde_json::Value;
use shared_types::{ErrorObject, PeerId, PeerRole, RoleAnnouncement};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// Current role, updated from `registry.role` announcements.
///
/// Until the first announcement arrives the role is only the one this peer
/// asked for. Cloning shares the underlying value.
#[derive(Clone)]
pub struct RoleState {
    tx: Arc<watch::Sender<PeerRole>>,
    announced: Arc<watch::Sender<bool>>,
}

impl RoleState {
    pub fn new(initial: PeerRole) -> Self {
        let (tx, _) = watch::channel(initial);
        let (announced, _) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            announced: Arc::new(announced),
        }
    }

    pub fn get(&self) -> PeerRole {
        *self.tx.borrow()
    }

    pub fn is_maestro(&self) -> bool {
        self.get().is_maestro()
    }

    /// Returns true if the role changed.
    pub fn set(&self, role: PeerRole) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == role {
                false
            } else {
                *current = role;
                true
            }
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<PeerRole> {
        self.tx.subscribe()
    }

    /// Wait until the role equals `role`. Returns false on timeout.
    pub async fn wait_for(&self, role: PeerRole, timeout: Duration) -> bool {
        let mut rx = self.subscribe();
        let reached = matches!(
            tokio::time::timeout(timeout, rx.wait_for(|current| *current == role)).await,
            Ok(Ok(_))
        );
        reached
    }

    /// True once the relay has announced this peer's role at least once.
    pub fn is_announced(&self) -> bool {
        *self.announced.borrow()
    }

    /// Wait for the first role announcement. Returns false on timeout.
    pub async fn wait_announced(&self, timeout: Duration) -> bool {
        let mut rx = self.announced.subscribe();
        let announced = matches!(
            tokio::time::timeout(timeout, rx.wait_for(|announced| *announced)).await,
            Ok(Ok(_))
        );
        announced
    }

    /// Apply the params of a role announcement addressed to `own_id`.
    pub(crate) fn apply_announcement(
        &self,
        own_id: &PeerId,
        params: Value,
    ) -> Result<(), ErrorObject> {
        let announcement: RoleAnnouncement = serde_json::from_value(params)
            .map_err(|e| ErrorObject::invalid_params(e.to_string()))?;

        if &announcement.client_id != own_id {
            warn!(
                peer_id = %own_id,
                announced = %announcement.client_id,
                "Ignoring role announcement for another peer"
            );
            return Ok(());
        }

        let role = PeerRole::from_flag(announcement.is_maestro);
        if self.set(role) {
            info!(peer_id = %own_id, role = ?role, "Role changed");
        }
        self.announced.send_replace(true);
        Ok(())
    }
}
