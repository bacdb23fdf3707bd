//! # Ensemble Node
//!
//! Runs the relay (`/ws`, `/health`) and, with `ENS_EMBEDDED_PEER=true`, a
//! peer engine connected to it. See [`NodeConfig`] for the environment.
//!
//! ## Startup Sequence
//!
//! 1. Initialize logging
//! 2. Load configuration
//! 3. Bind and serve the relay
//! 4. Start the embedded peer, if enabled
//! 5. Wait for Ctrl+C, then shut down gracefully

use std::sync::Arc;

use anyhow::{Context, Result};
use ens_01_rpc::TransportConfig;
use ens_02_peer_registry::RelayServer;
use ens_04_shared_state::KvStore;
use ensemble_telemetry::{init_logging, TelemetryConfig};
use node_runtime::{log_coordination_events, EngineBuilder, JsonFileKvStore, NodeConfig, SystemModule};
use shared_bus::{EventFilter, EventPublisher, InMemoryEventBus};
use shared_types::PeerId;
use tokio::sync::watch;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging(&TelemetryConfig::for_component("node")).context("Failed to initialize logging")?;

    let config = NodeConfig::from_env().context("Invalid configuration")?;

    let bus = Arc::new(InMemoryEventBus::new());
    tokio::spawn(log_coordination_events(bus.subscribe(EventFilter::all())));

    let publisher: Arc<dyn EventPublisher> = bus.clone();
    let server = RelayServer::new(config.relay.clone(), publisher)?;
    let listener = server.bind().await?;
    let addr = listener.local_addr()?;

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let relay = tokio::spawn(server.serve(listener, async move {
        let _ = shutdown_rx.wait_for(|stop| *stop).await;
    }));

    let engine = if config.embedded_peer {
        let peer_id = config.peer_id.clone().unwrap_or_else(PeerId::generate);
        let mut transport = TransportConfig::new(NodeConfig::local_relay_url(addr), peer_id);
        transport.is_maestro = config.is_maestro;

        let mut builder = EngineBuilder::new(transport)
            .endpoint_config(config.endpoint.clone())
            .event_bus(bus.clone())
            .register_module(SystemModule);
        if let Some(path) = &config.data_file {
            let store: Arc<dyn KvStore> = Arc::new(JsonFileKvStore::open(path).await?);
            builder = builder.persistent_store(store);
        }
        Some(builder.build().await.context("Failed to start embedded peer")?)
    } else {
        None
    };

    info!(addr = %addr, embedded_peer = engine.is_some(), "Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    info!("Initiating graceful shutdown...");
    if let Some(engine) = &engine {
        engine.shutdown().await;
    }
    let _ = shutdown_tx.send(true);
    match relay.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "Relay stopped with an error"),
        Err(e) => error!(error = %e, "Relay task failed"),
    }

    info!("Shutdown complete");
    Ok(())
}
