//! WebSocket transport with automatic reconnection.

use crate::domain::{ConfigError, TransportConfig, TransportError};
use crate::ports::{TransportChannel, TransportEvent, TransportState};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use url::Url;

/// State shared between the handle and the connection loop.
struct Shared {
    /// Present only while a connection is open.
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    state: watch::Sender<TransportState>,
}

impl Shared {
    fn set_state(&self, state: TransportState) {
        self.state.send_replace(state);
    }
}

/// WebSocket client transport.
///
/// One background task owns the socket and the retry loop, so at most one
/// connection attempt is in flight at any time. The same `clientId` is
/// presented on every reconnect.
pub struct WsTransport {
    shared: Arc<Shared>,
    shutdown: watch::Sender<bool>,
}

impl WsTransport {
    /// Validate the config and start connecting in the background.
    pub fn connect(
        config: TransportConfig,
    ) -> Result<(Arc<Self>, mpsc::UnboundedReceiver<TransportEvent>), ConfigError> {
        config.validate()?;
        let url = config.connect_url()?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (state_tx, _) = watch::channel(TransportState::Connecting);

        let shared = Arc::new(Shared {
            outbound: Mutex::new(None),
            state: state_tx,
        });

        tokio::spawn(connection_loop(
            config,
            url,
            shared.clone(),
            event_tx,
            shutdown_rx,
        ));

        Ok((
            Arc::new(Self {
                shared,
                shutdown: shutdown_tx,
            }),
            event_rx,
        ))
    }

    /// Watch connection state changes.
    pub fn watch_state(&self) -> watch::Receiver<TransportState> {
        self.shared.state.subscribe()
    }

    /// Wait until the transport is open. Returns false on timeout or shutdown.
    pub async fn wait_open(&self, timeout: Duration) -> bool {
        let mut state = self.watch_state();
        let wait = state.wait_for(|s| matches!(s, TransportState::Open | TransportState::Closed));
        let opened = matches!(
            tokio::time::timeout(timeout, wait).await,
            Ok(Ok(s)) if *s == TransportState::Open
        );
        opened
    }

    /// Stop the connection loop. The transport cannot be reopened.
    pub fn close(&self) {
        self.shutdown.send_replace(true);
    }
}

impl TransportChannel for WsTransport {
    fn send(&self, text: String) -> Result<(), TransportError> {
        let outbound = self.shared.outbound.lock();
        match outbound.as_ref() {
            Some(sender) => sender.send(text).map_err(|_| TransportError::Closed),
            None => Err(TransportError::NotOpen),
        }
    }

    fn state(&self) -> TransportState {
        *self.shared.state.borrow()
    }
}

/// Connection loop with reconnection logic.
async fn connection_loop(
    config: TransportConfig,
    url: Url,
    shared: Arc<Shared>,
    events: mpsc::UnboundedSender<TransportEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut attempts = 0u32;

    loop {
        if *shutdown.borrow() {
            break;
        }
        shared.set_state(TransportState::Connecting);

        let result = tokio::select! {
            result = run_connection(url.as_str(), &shared, &events) => result,
            _ = shutdown.changed() => break,
        };

        match result {
            Ok(()) => {
                info!(peer_id = %config.peer_id, "Connection closed by relay");
                attempts = 0;
            }
            Err(TransportError::Connect(e)) => {
                attempts += 1;
                warn!(peer_id = %config.peer_id, attempt = attempts, error = %e, "Connection attempt failed");
                let _ = events.send(TransportEvent::Error(e));
            }
            Err(e) => {
                warn!(peer_id = %config.peer_id, error = %e, "Connection dropped");
                attempts = 0;
                let _ = events.send(TransportEvent::Error(e.to_string()));
            }
        }

        if config.reconnect.exhausted(attempts) {
            error!(
                peer_id = %config.peer_id,
                attempts = attempts,
                "Giving up on reconnection"
            );
            let _ = events.send(TransportEvent::Error(format!(
                "reconnection failed after {} attempts",
                attempts
            )));
            break;
        }

        shared.set_state(TransportState::Reconnecting);
        let delay = config.reconnect.delay_for(attempts);
        debug!(peer_id = %config.peer_id, delay_ms = delay.as_millis(), "Scheduling reconnect");

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.changed() => break,
        }
    }

    // Shutdown may interrupt an open connection before it reports closure.
    let was_open = shared.outbound.lock().take().is_some();
    shared.set_state(TransportState::Closed);
    if was_open {
        let _ = events.send(TransportEvent::Closed);
    }
    debug!(peer_id = %config.peer_id, "Connection loop stopped");
}

/// Run a single WebSocket connection until it closes.
async fn run_connection(
    url: &str,
    shared: &Shared,
    events: &mpsc::UnboundedSender<TransportEvent>,
) -> Result<(), TransportError> {
    let (ws_stream, _) = connect_async(url)
        .await
        .map_err(|e| TransportError::Connect(e.to_string()))?;

    let (mut write, mut read) = ws_stream.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();

    *shared.outbound.lock() = Some(out_tx);
    shared.set_state(TransportState::Open);
    info!(url = url, "Connected to relay");
    let _ = events.send(TransportEvent::Open);

    let result = loop {
        tokio::select! {
            Some(text) = out_rx.recv() => {
                if let Err(e) = write.send(Message::Text(text.into())).await {
                    break Err(TransportError::Send(e.to_string()));
                }
            }
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let _ = events.send(TransportEvent::Message(text.as_str().to_owned()));
                }
                Some(Ok(Message::Ping(data))) => {
                    let _ = write.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(_))) | None => break Ok(()),
                Some(Ok(_)) => {}
                Some(Err(e)) => break Err(TransportError::Receive(e.to_string())),
            }
        }
    };

    shared.outbound.lock().take();
    let _ = events.send(TransportEvent::Closed);
    result
}
