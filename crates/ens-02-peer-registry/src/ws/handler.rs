//! Per-connection WebSocket task.
//!
//! Registers the peer, pumps its outbound queue into the socket, and feeds
//! every inbound text frame to the relay. Frames from one connection are
//! relayed in arrival order.

use crate::registry::PeerRegistry;
use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use shared_types::{ErrorObject, RpcEnvelope};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Query parameters of `GET /ws`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectParams {
    #[serde(rename = "clientId")]
    pub client_id: Option<String>,
    pub is_maestro: Option<String>,
}

impl ConnectParams {
    pub fn claims_maestro(&self) -> bool {
        self.is_maestro
            .as_deref()
            .is_some_and(|flag| flag.eq_ignore_ascii_case("true"))
    }
}

/// Handle a WebSocket connection
pub async fn handle_socket(
    socket: WebSocket,
    registry: Arc<PeerRegistry>,
    params: ConnectParams,
    max_message_size: usize,
) {
    let (mut sink, mut stream) = socket.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();

    let registration = registry.register(
        params.client_id.as_deref(),
        params.claims_maestro(),
        out_tx.clone(),
    );
    let peer_id = registration.peer_id.clone();

    let writer = tokio::spawn(async move {
        while let Some(text) = out_rx.recv().await {
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(result) = stream.next().await {
        let text = match result {
            Ok(Message::Text(text)) => text,
            Ok(Message::Binary(data)) => match String::from_utf8(data) {
                Ok(text) => text,
                Err(_) => {
                    debug!(peer_id = %peer_id, "Dropping non-UTF-8 binary frame");
                    continue;
                }
            },
            Ok(Message::Close(_)) => break,
            // Pings are answered by axum.
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
            Err(e) => {
                debug!(peer_id = %peer_id, error = %e, "WebSocket receive error");
                break;
            }
        };

        if text.len() > max_message_size {
            warn!(
                peer_id = %peer_id,
                size = text.len(),
                max = max_message_size,
                "Message exceeds size limit"
            );
            let error = ErrorObject::invalid_request(format!(
                "Message too large: {} bytes (max: {})",
                text.len(),
                max_message_size
            ));
            if let Ok(reply) = RpcEnvelope::failure(None, error).to_text() {
                let _ = out_tx.send(reply);
            }
            continue;
        }

        let outcome = registry.relay(&peer_id, &text);
        debug!(peer_id = %peer_id, outcome = ?outcome, "Relayed frame");
    }

    registry.unregister(&peer_id, registration.connection_id);
    drop(out_tx);
    writer.abort();
}
