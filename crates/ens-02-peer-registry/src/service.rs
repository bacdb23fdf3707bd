//! Relay server - HTTP entry point.
//!
//! Routes:
//! - `GET /ws?clientId=<id>&is_maestro=true` upgrades to a peer connection
//! - `GET /health` reports peer count and the maestro id

use crate::domain::{RegistryConfig, RegistryError};
use crate::registry::PeerRegistry;
use crate::ws::{handle_socket, ConnectParams};
use axum::{
    extract::{ws::WebSocketUpgrade, Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use shared_bus::EventPublisher;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    registry: Arc<PeerRegistry>,
    max_message_size: usize,
}

/// The relay: peer registry plus its HTTP/WebSocket surface.
pub struct RelayServer {
    config: RegistryConfig,
    registry: Arc<PeerRegistry>,
}

impl RelayServer {
    pub fn new(config: RegistryConfig, bus: Arc<dyn EventPublisher>) -> Result<Self, RegistryError> {
        config.validate()?;
        let registry = Arc::new(PeerRegistry::new(config.maestro_loss, bus));
        Ok(Self { config, registry })
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn registry(&self) -> Arc<PeerRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn router(&self) -> Router {
        let state = AppState {
            registry: Arc::clone(&self.registry),
            max_message_size: self.config.max_message_size,
        };

        Router::new()
            .route("/ws", get(ws_upgrade))
            .route("/health", get(health_check))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Bind the configured address.
    pub async fn bind(&self) -> Result<TcpListener, RegistryError> {
        let addr = self.config.socket_addr();
        TcpListener::bind(addr)
            .await
            .map_err(|source| RegistryError::Bind { addr, source })
    }

    /// Serve until `shutdown` resolves.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), RegistryError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr: Option<SocketAddr> = listener.local_addr().ok();
        info!(addr = ?addr, policy = ?self.config.maestro_loss, "Relay listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(RegistryError::Serve)?;

        info!("Relay stopped");
        Ok(())
    }
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        handle_socket(socket, state.registry, params, state.max_message_size)
    })
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let maestro = state.registry.maestro();
    let maestro_connected = state.registry.connected_maestro().is_some();
    Json(serde_json::json!({
        "status": "ok",
        "peers": state.registry.peer_count(),
        "maestro": maestro.map(|id| id.to_string()),
        "maestroConnected": maestro_connected,
        "version": env!("CARGO_PKG_VERSION")
    }))
}
