//! # RPC Endpoint
//!
//! Client and server side of JSON-RPC over one [`TransportChannel`]:
//!
//! - `register_method` installs a handler for incoming requests and
//!   notifications.
//! - `call` sends a request and awaits the correlated response.
//! - `notify` sends a fire-and-forget notification; offline it is a no-op.
//!
//! Inbound notifications run inline, in arrival order, so state updates from
//! one origin apply in the order they were sent. Inbound requests run on their
//! own task so a slow handler never stalls the channel.

use crate::domain::{
    cleanup_task, CallError, EndpointConfig, PendingRequestStore, TransportError,
};
use crate::ports::{TransportChannel, TransportEvent};
use crate::role::RoleState;
use dashmap::DashMap;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::Value;
use shared_types::{
    CorrelationId, EnvelopeKind, ErrorObject, PeerId, PeerRole, RequestId, RpcEnvelope,
    ROLE_METHOD,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Who invoked a handler.
#[derive(Debug, Clone)]
pub struct CallContext {
    /// Origin peer, from the envelope's `clientId`.
    pub caller: Option<PeerId>,
    pub method: String,
}

/// Type-erased method handler.
pub type MethodHandler =
    Arc<dyn Fn(Value, CallContext) -> BoxFuture<'static, Result<Value, ErrorObject>> + Send + Sync>;

pub struct RpcEndpoint {
    peer_id: PeerId,
    transport: Arc<dyn TransportChannel>,
    methods: DashMap<String, MethodHandler>,
    pending: Arc<PendingRequestStore>,
    role: RoleState,
    config: EndpointConfig,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Cancels the pending entry if the call future is dropped early.
struct PendingGuard<'a> {
    store: &'a PendingRequestStore,
    id: CorrelationId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.store.cancel(&self.id);
    }
}

impl RpcEndpoint {
    /// Create an endpoint and start its dispatch and cleanup tasks.
    ///
    /// `initial_role` holds until the relay's first role announcement.
    pub fn spawn(
        peer_id: PeerId,
        transport: Arc<dyn TransportChannel>,
        events: mpsc::UnboundedReceiver<TransportEvent>,
        config: EndpointConfig,
        initial_role: PeerRole,
    ) -> Arc<Self> {
        let endpoint = Arc::new(Self {
            peer_id,
            transport,
            methods: DashMap::new(),
            pending: Arc::new(PendingRequestStore::new(config.call_timeout)),
            role: RoleState::new(initial_role),
            config,
            tasks: Mutex::new(Vec::new()),
        });

        let role = endpoint.role.clone();
        let own_id = endpoint.peer_id.clone();
        endpoint.register_method(ROLE_METHOD, move |params, _ctx| {
            let result = role.apply_announcement(&own_id, params);
            async move { result.map(|()| Value::Null) }
        });

        let dispatch = tokio::spawn(endpoint.clone().dispatch_loop(events));
        let cleanup = tokio::spawn(cleanup_task(
            endpoint.pending.clone(),
            endpoint.config.cleanup_interval,
        ));
        endpoint.tasks.lock().extend([dispatch, cleanup]);

        endpoint
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    pub fn role(&self) -> &RoleState {
        &self.role
    }

    pub fn is_maestro(&self) -> bool {
        self.role.is_maestro()
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_open()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.pending_count()
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Register a handler for `name`. A second registration replaces the first.
    pub fn register_method<F, Fut>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(Value, CallContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ErrorObject>> + Send + 'static,
    {
        let name = name.into();
        let handler: MethodHandler = Arc::new(move |params, ctx| Box::pin(handler(params, ctx)));
        if self.methods.insert(name.clone(), handler).is_some() {
            debug!(method = %name, "Method handler replaced");
        } else {
            trace!(method = %name, "Method registered");
        }
    }

    /// Call `method` with the default timeout.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, CallError> {
        self.call_with_timeout(method, params, self.config.call_timeout)
            .await
    }

    /// Call `method` and wait at most `timeout` for the response.
    pub async fn call_with_timeout(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, CallError> {
        if !self.transport.is_open() {
            return Err(CallError::TransportNotOpen);
        }

        let (id, rx) = self.pending.register(method, Some(timeout));
        let _guard = PendingGuard {
            store: &self.pending,
            id,
        };

        let text = RpcEnvelope::request(method, params, RequestId::from(id))
            .with_client_id(self.peer_id.clone())
            .to_text()?;
        self.transport.send(text)?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(CallError::ConnectionLost),
            Err(_) => Err(CallError::Timeout {
                method: method.to_string(),
                after: timeout,
            }),
        }
    }

    /// Send a notification as this peer. Returns false if it was not sent.
    pub fn notify(&self, method: &str, params: Value) -> bool {
        self.notify_on_behalf_of(method, params, &self.peer_id)
    }

    /// Send a notification stamped with another origin's `clientId`, so the
    /// relay does not echo it back to that origin.
    pub fn notify_on_behalf_of(&self, method: &str, params: Value, origin: &PeerId) -> bool {
        if !self.transport.is_open() {
            trace!(method = method, "Not connected, notification skipped");
            return false;
        }

        let text = match RpcEnvelope::notification(method, params)
            .with_client_id(origin.clone())
            .to_text()
        {
            Ok(text) => text,
            Err(e) => {
                warn!(method = method, error = %e, "Failed to encode notification");
                return false;
            }
        };

        match self.transport.send(text) {
            Ok(()) => true,
            Err(TransportError::NotOpen) => false,
            Err(e) => {
                debug!(method = method, error = %e, "Notification send failed");
                false
            }
        }
    }

    /// Abort background tasks. Outstanding calls fail with `ConnectionLost`.
    pub fn shutdown(&self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        self.pending.fail_all();
    }

    async fn dispatch_loop(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<TransportEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                TransportEvent::Open => {
                    info!(peer_id = %self.peer_id, "Endpoint connected");
                }
                TransportEvent::Message(text) => self.handle_text(&text).await,
                TransportEvent::Closed => {
                    let failed = self.pending.fail_all();
                    if failed > 0 {
                        warn!(
                            peer_id = %self.peer_id,
                            failed = failed,
                            "Connection closed with calls outstanding"
                        );
                    } else {
                        info!(peer_id = %self.peer_id, "Endpoint disconnected");
                    }
                }
                TransportEvent::Error(e) => {
                    debug!(peer_id = %self.peer_id, error = %e, "Transport error");
                }
            }
        }
        debug!(peer_id = %self.peer_id, "Dispatch loop stopped");
    }

    async fn handle_text(self: &Arc<Self>, text: &str) {
        let envelope = match RpcEnvelope::parse(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!(error = %e, "Dropping malformed envelope");
                return;
            }
        };

        match envelope.kind() {
            Some(EnvelopeKind::Response) => self.handle_response(envelope),
            Some(EnvelopeKind::Notification) => self.handle_notification(envelope).await,
            Some(EnvelopeKind::Request) => {
                let this = self.clone();
                tokio::spawn(async move { this.handle_request(envelope).await });
            }
            None => {}
        }
    }

    fn handle_response(&self, envelope: RpcEnvelope) {
        let correlation_id = match &envelope.id {
            Some(RequestId::String(raw)) => CorrelationId::parse(raw).ok(),
            _ => None,
        };
        let Some(correlation_id) = correlation_id else {
            debug!(id = ?envelope.id, "Dropping response with foreign id");
            return;
        };

        let outcome = envelope.into_outcome().map_err(CallError::Remote);
        self.pending.complete(correlation_id, outcome);
    }

    async fn handle_notification(&self, envelope: RpcEnvelope) {
        let method = envelope.method.unwrap_or_default();
        let Some(handler) = self.lookup(&method) else {
            debug!(method = %method, "No handler for notification");
            return;
        };

        let ctx = CallContext {
            caller: envelope.client_id,
            method: method.clone(),
        };
        if let Err(e) = handler(envelope.params.unwrap_or(Value::Null), ctx).await {
            warn!(method = %method, error = %e, "Notification handler failed");
        }
    }

    async fn handle_request(&self, envelope: RpcEnvelope) {
        let method = envelope.method.unwrap_or_default();
        let id = envelope.id;
        let caller = envelope.client_id;

        let outcome = match self.lookup(&method) {
            Some(handler) => {
                let ctx = CallContext {
                    caller: caller.clone(),
                    method: method.clone(),
                };
                handler(envelope.params.unwrap_or(Value::Null), ctx).await
            }
            None => {
                debug!(method = %method, "Request for unknown method");
                Err(ErrorObject::method_not_found(&method))
            }
        };

        let mut response = match (outcome, id) {
            (Ok(result), Some(id)) => RpcEnvelope::success(id, result),
            (Err(error), id) => {
                debug!(method = %method, error = %error, "Handler returned error");
                RpcEnvelope::failure(id, error)
            }
            (Ok(_), None) => return,
        };
        // The relay routes the response back by the caller's id.
        if let Some(caller) = caller {
            response = response.with_client_id(caller);
        }

        match response.to_text() {
            Ok(text) => {
                if let Err(e) = self.transport.send(text) {
                    warn!(method = %method, error = %e, "Failed to send response");
                }
            }
            Err(e) => warn!(method = %method, error = %e, "Failed to encode response"),
        }
    }

    fn lookup(&self, method: &str) -> Option<MethodHandler> {
        self.methods.get(method).map(|entry| entry.value().clone())
    }
}

impl Drop for RpcEndpoint {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}
