//! Fixtures: a relay on an ephemeral loopback port and engines wired to it.

use ens_01_rpc::{EndpointConfig, ReconnectConfig, TransportConfig};
use ens_02_peer_registry::{MaestroLossPolicy, PeerRegistry, RegistryConfig, RelayServer};
use node_runtime::EngineBuilder;
use shared_bus::InMemoryEventBus;
use shared_types::PeerId;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// How long fixtures wait for the network to settle.
pub const SETTLE: Duration = Duration::from_secs(3);

/// A relay serving on `127.0.0.1:<ephemeral>`. Stops when dropped.
pub struct TestRelay {
    addr: SocketAddr,
    registry: Arc<PeerRegistry>,
    bus: Arc<InMemoryEventBus>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestRelay {
    pub async fn start() -> Self {
        Self::with_policy(MaestroLossPolicy::Reject).await
    }

    pub async fn with_policy(policy: MaestroLossPolicy) -> Self {
        ensemble_telemetry::try_init_test_logging();

        let config = RegistryConfig {
            maestro_loss: policy,
            ..RegistryConfig::local_ephemeral()
        };
        let bus = Arc::new(InMemoryEventBus::new());
        let server = RelayServer::new(config, bus.clone()).expect("relay config");
        let registry = server.registry();
        let listener = server.bind().await.expect("bind loopback");
        let addr = listener.local_addr().expect("local addr");

        let (shutdown, stopped) = oneshot::channel::<()>();
        tokio::spawn(server.serve(listener, async move {
            let _ = stopped.await;
        }));

        Self {
            addr,
            registry,
            bus,
            shutdown: Some(shutdown),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base WebSocket URL, without query parameters.
    pub fn url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub fn registry(&self) -> &Arc<PeerRegistry> {
        &self.registry
    }

    pub fn bus(&self) -> &Arc<InMemoryEventBus> {
        &self.bus
    }

    /// Builder for a peer that connects without claiming maestro.
    pub fn peer(&self, id: &str) -> EngineBuilder {
        EngineBuilder::new(self.transport(id)).connect_timeout(SETTLE)
    }

    /// Builder for a peer that connects with the maestro flag.
    pub fn maestro(&self, id: &str) -> EngineBuilder {
        EngineBuilder::new(self.transport(id).as_maestro()).connect_timeout(SETTLE)
    }

    fn transport(&self, id: &str) -> TransportConfig {
        TransportConfig::new(self.url(), PeerId::new(id))
            .with_reconnect(ReconnectConfig::fixed(Duration::from_millis(50)))
    }

    /// Wait until the relay lists `id` as connected.
    pub async fn wait_connected(&self, id: &str) {
        let peer_id = PeerId::new(id);
        eventually(&format!("{} to connect", id), || {
            self.registry.is_connected(&peer_id)
        })
        .await;
    }

    /// Wait until the relay no longer lists `id`.
    pub async fn wait_disconnected(&self, id: &str) {
        let peer_id = PeerId::new(id);
        eventually(&format!("{} to disconnect", id), || {
            !self.registry.is_connected(&peer_id)
        })
        .await;
    }

    /// Begin graceful shutdown of the server.
    pub fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

impl Drop for TestRelay {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Endpoint config with a short call timeout, for tests that expect one.
pub fn short_timeouts(call_timeout: Duration) -> EndpointConfig {
    EndpointConfig {
        call_timeout,
        cleanup_interval: Duration::from_millis(50),
    }
}

/// Poll `check` every 10 ms until it holds, or panic after [`SETTLE`].
pub async fn eventually<F>(what: &str, check: F)
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + SETTLE;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {}", what);
}
