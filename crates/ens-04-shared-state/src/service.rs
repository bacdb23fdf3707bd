//! # Shared State Service
//!
//! Process-wide cache of named state values, kept convergent across peers by
//! `shared_state.set` notifications.
//!
//! ```text
//!  send_rpc_set_shared_state(k, v)            receive (from relay)
//!        │                                          │
//!        ├─► cache[k] = v                 cache[k] = v ◄─┤
//!        ├─► subscribers(k)             subscribers(k) ◄─┤
//!        └─► notify {key, data} ──relay──► ...           └─► maestro only:
//!                                                            rebroadcast for origin
//! ```
//!
//! Both paths write the cache before notifying, so a read from inside a
//! subscriber callback already sees the new value. Notifications arrive on
//! one connection and are applied inline, which keeps updates from a single
//! origin in issue order.

use crate::errors::StoreError;
use crate::ports::KvStore;
use dashmap::DashMap;
use ens_01_rpc::RpcEndpoint;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_bus::{CoordinationEvent, EventPublisher};
use shared_types::{ErrorObject, PeerId, StateKey};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, trace, warn};

/// Notification method carrying state changes between peers.
pub const SET_SHARED_STATE_METHOD: &str = "shared_state.set";

/// Params of a `shared_state.set` notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetSharedState {
    pub key: StateKey,
    pub data: Value,
}

/// A change delivered to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    pub key: StateKey,
    pub value: Value,
    /// Peer that made the change; `None` when it was made on this peer.
    pub origin: Option<PeerId>,
}

impl StateChange {
    pub fn is_remote(&self) -> bool {
        self.origin.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Subscriber callback. Runs synchronously on the thread applying the change.
pub type StateCallback = Arc<dyn Fn(&StateChange) + Send + Sync>;

pub struct SharedStateService {
    endpoint: Arc<RpcEndpoint>,
    cache: DashMap<StateKey, Value>,
    subscribers: RwLock<HashMap<StateKey, Vec<(SubscriptionId, StateCallback)>>>,
    next_subscription: AtomicU64,
    bus: Option<Arc<dyn EventPublisher>>,
}

impl SharedStateService {
    /// Create the service and register its notification handler on `endpoint`.
    pub fn new(endpoint: Arc<RpcEndpoint>, bus: Option<Arc<dyn EventPublisher>>) -> Arc<Self> {
        let service = Arc::new(Self {
            endpoint,
            cache: DashMap::new(),
            subscribers: RwLock::new(HashMap::new()),
            next_subscription: AtomicU64::new(1),
            bus,
        });

        let weak: Weak<Self> = Arc::downgrade(&service);
        service
            .endpoint
            .register_method(SET_SHARED_STATE_METHOD, move |params, ctx| {
                // Applied before the returned future is polled, so the
                // endpoint's in-order notification dispatch is preserved.
                let result = match weak.upgrade() {
                    Some(service) => service.handle_set(params, ctx.caller),
                    None => Ok(Value::Null),
                };
                async move { result }
            });

        service
    }

    pub fn endpoint(&self) -> &Arc<RpcEndpoint> {
        &self.endpoint
    }

    pub fn peer_id(&self) -> &PeerId {
        self.endpoint.peer_id()
    }

    pub fn is_maestro(&self) -> bool {
        self.endpoint.is_maestro()
    }

    /// Call `callback` for every change to `key`, after the callbacks
    /// registered before it.
    pub fn subscribe<F>(&self, key: &StateKey, callback: F) -> SubscriptionId
    where
        F: Fn(&StateChange) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .write()
            .entry(key.clone())
            .or_default()
            .push((id, Arc::new(callback)));
        trace!(key = %key, subscription = id.0, "Subscribed");
        id
    }

    /// Returns false if the subscription was already gone.
    pub fn unsubscribe(&self, key: &StateKey, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write();
        let Some(list) = subscribers.get_mut(key) else {
            return false;
        };
        let before = list.len();
        list.retain(|(sub, _)| *sub != id);
        let removed = list.len() != before;
        if list.is_empty() {
            subscribers.remove(key);
        }
        removed
    }

    pub fn subscriber_count(&self, key: &StateKey) -> usize {
        self.subscribers.read().get(key).map_or(0, Vec::len)
    }

    pub fn get_cached_value(&self, key: &StateKey) -> Option<Value> {
        self.cache.get(key).map(|entry| entry.value().clone())
    }

    /// Write the cache without notifying anyone.
    pub fn set_cached_value(&self, key: &StateKey, value: Value) {
        self.cache.insert(key.clone(), value);
    }

    /// Current value of `key`, seeding it with `initial` if it has none.
    pub fn get_or_seed(&self, key: &StateKey, initial: Value) -> Value {
        self.cache.entry(key.clone()).or_insert(initial).value().clone()
    }

    pub fn cached_keys(&self) -> Vec<StateKey> {
        self.cache.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Apply a change on this peer only.
    pub fn set_local(&self, key: &StateKey, value: Value) {
        self.apply(StateChange {
            key: key.clone(),
            value,
            origin: None,
        });
    }

    /// Apply a change here and broadcast it to every other peer.
    ///
    /// Returns whether the broadcast went out. Offline the change is still
    /// applied locally.
    pub fn send_rpc_set_shared_state(&self, key: &StateKey, value: Value) -> bool {
        let params = SetSharedState {
            key: key.clone(),
            data: value.clone(),
        };
        self.set_local(key, value);

        let sent = match serde_json::to_value(&params) {
            Ok(params) => self.endpoint.notify(SET_SHARED_STATE_METHOD, params),
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to encode state change");
                false
            }
        };
        if !sent {
            debug!(key = %key, "State change applied locally only");
        }
        sent
    }

    /// Apply a change that arrived from `origin`.
    ///
    /// On the maestro the change is rebroadcast on the origin's behalf so the
    /// remaining peers converge.
    pub fn receive_rpc_set_shared_state(&self, message: SetSharedState, origin: Option<PeerId>) {
        if !self.cache.contains_key(&message.key) {
            warn!(
                key = %message.key,
                origin = ?origin,
                "State received for a key not initialised on this peer"
            );
        }

        let rebroadcast = match &origin {
            Some(origin) if self.is_maestro() && origin != self.endpoint.peer_id() => {
                serde_json::to_value(&message).ok().map(|params| (origin.clone(), params))
            }
            _ => None,
        };

        self.apply(StateChange {
            key: message.key,
            value: message.data,
            origin,
        });

        if let Some((origin, params)) = rebroadcast {
            if self
                .endpoint
                .notify_on_behalf_of(SET_SHARED_STATE_METHOD, params, &origin)
            {
                trace!(origin = %origin, "State change rebroadcast");
            }
        }
    }

    /// Warm the cache from `store`. Keys already cached keep their values.
    pub async fn preload(&self, store: &dyn KvStore) -> Result<usize, StoreError> {
        let entries = store.get_all().await?;
        let mut loaded = 0;
        for (key, value) in entries {
            let key = StateKey::from_raw(key);
            if !self.cache.contains_key(&key) {
                self.cache.insert(key, value);
                loaded += 1;
            }
        }
        info!(loaded = loaded, "Shared state preloaded");
        Ok(loaded)
    }

    fn handle_set(&self, params: Value, caller: Option<PeerId>) -> Result<Value, ErrorObject> {
        let message: SetSharedState = serde_json::from_value(params)
            .map_err(|e| ErrorObject::invalid_params(e.to_string()))?;
        self.receive_rpc_set_shared_state(message, caller);
        Ok(Value::Null)
    }

    fn apply(&self, change: StateChange) {
        self.cache.insert(change.key.clone(), change.value.clone());

        if let Some(bus) = &self.bus {
            bus.publish(CoordinationEvent::StateChanged {
                key: change.key.clone(),
                origin: change.origin.clone(),
            });
        }

        // Callbacks may subscribe or set state themselves.
        let callbacks: Vec<StateCallback> = self
            .subscribers
            .read()
            .get(&change.key)
            .map(|list| list.iter().map(|(_, cb)| Arc::clone(cb)).collect())
            .unwrap_or_default();

        for callback in callbacks {
            callback(&change);
        }
    }
}
