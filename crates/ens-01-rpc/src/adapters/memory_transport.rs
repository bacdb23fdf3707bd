//! In-memory transport for driving an endpoint without sockets.

use crate::domain::TransportError;
use crate::ports::{TransportChannel, TransportEvent, TransportState};
use parking_lot::Mutex;
use shared_types::RpcEnvelope;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Transport whose far end is a [`MemoryTransportHandle`].
pub struct InMemoryTransport {
    state: Mutex<TransportState>,
    sent: mpsc::UnboundedSender<String>,
}

/// The far end: inspects sent frames and injects events.
pub struct MemoryTransportHandle {
    transport: Arc<InMemoryTransport>,
    sent: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl InMemoryTransport {
    /// Create a transport in the `Connecting` state.
    pub fn new() -> (
        Arc<Self>,
        mpsc::UnboundedReceiver<TransportEvent>,
        MemoryTransportHandle,
    ) {
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            state: Mutex::new(TransportState::Connecting),
            sent: sent_tx,
        });
        let handle = MemoryTransportHandle {
            transport: transport.clone(),
            sent: sent_rx,
            events: event_tx,
        };
        (transport, event_rx, handle)
    }
}

impl TransportChannel for InMemoryTransport {
    fn send(&self, text: String) -> Result<(), TransportError> {
        if *self.state.lock() != TransportState::Open {
            return Err(TransportError::NotOpen);
        }
        self.sent.send(text).map_err(|_| TransportError::Closed)
    }

    fn state(&self) -> TransportState {
        *self.state.lock()
    }
}

impl MemoryTransportHandle {
    pub fn open(&self) {
        *self.transport.state.lock() = TransportState::Open;
        let _ = self.events.send(TransportEvent::Open);
    }

    pub fn close(&self) {
        *self.transport.state.lock() = TransportState::Reconnecting;
        let _ = self.events.send(TransportEvent::Closed);
    }

    /// Inject an inbound text frame.
    pub fn deliver(&self, text: impl Into<String>) {
        let _ = self.events.send(TransportEvent::Message(text.into()));
    }

    /// Inject an inbound envelope.
    pub fn deliver_envelope(&self, envelope: &RpcEnvelope) {
        if let Ok(text) = envelope.to_text() {
            self.deliver(text);
        }
    }

    /// Next frame the endpoint sent.
    pub async fn next_sent(&mut self) -> Option<String> {
        self.sent.recv().await
    }

    /// Next frame the endpoint sent, parsed. Skips frames that do not parse.
    pub async fn next_envelope(&mut self) -> Option<RpcEnvelope> {
        while let Some(text) = self.sent.recv().await {
            if let Ok(envelope) = RpcEnvelope::parse(&text) {
                return Some(envelope);
            }
        }
        None
    }

    pub fn try_next_sent(&mut self) -> Option<String> {
        self.sent.try_recv().ok()
    }
}
