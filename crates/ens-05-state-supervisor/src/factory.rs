//! Creates supervisors and owns the stores' writer tasks.

use crate::errors::StateError;
use crate::supervisor::{
    PersistentStateSupervisor, Propagation, SharedStateSupervisor, StateCell,
    UserAgentStateSupervisor,
};
use crate::writer::PersistWriter;
use ens_04_shared_state::{KvStore, SharedStateService};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use shared_types::StateKey;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, trace};

struct Backend {
    store: Arc<dyn KvStore>,
    writer: PersistWriter,
}

impl Backend {
    fn spawn(store: Arc<dyn KvStore>, label: &'static str) -> Self {
        let writer = PersistWriter::spawn(store.clone(), label);
        Self { store, writer }
    }
}

pub struct StateFactory {
    service: Arc<SharedStateService>,
    persistent: Backend,
    user_agent: Backend,
    /// Persistent keys whose changes the maestro writes through.
    persisted_keys: Mutex<HashSet<StateKey>>,
}

impl StateFactory {
    /// Must be called inside a Tokio runtime.
    pub fn new(
        service: Arc<SharedStateService>,
        persistent_store: Arc<dyn KvStore>,
        user_agent_store: Arc<dyn KvStore>,
    ) -> Self {
        Self {
            service,
            persistent: Backend::spawn(persistent_store, "persistent"),
            user_agent: Backend::spawn(user_agent_store, "useragent"),
            persisted_keys: Mutex::new(HashSet::new()),
        }
    }

    pub fn service(&self) -> &Arc<SharedStateService> {
        &self.service
    }

    /// Shared state seeded with `initial` unless the key already has a value.
    pub fn create_shared_state<T>(
        &self,
        key: StateKey,
        initial: T,
    ) -> Result<SharedStateSupervisor<T>, StateError>
    where
        T: Serialize + DeserializeOwned,
    {
        self.service.get_or_seed(&key, encode(&key, &initial)?);
        Ok(SharedStateSupervisor::new(StateCell::new(
            self.service.clone(),
            key,
            Propagation::Broadcast,
            None,
        )))
    }

    /// Shared state backed by the durable store.
    ///
    /// Resolves from the cache, else the store, else `initial`. A maestro
    /// writes `initial` back when nothing was stored, and from then on
    /// persists every change to the key, whichever peer made it.
    pub async fn create_persistent_state<T>(
        &self,
        key: StateKey,
        initial: T,
    ) -> Result<PersistentStateSupervisor<T>, StateError>
    where
        T: Serialize + DeserializeOwned,
    {
        let initial = encode(&key, &initial)?;
        if self.service.get_cached_value(&key).is_none() {
            self.resolve_from(&self.persistent, &key, initial, self.service.is_maestro())
                .await?;
        }
        self.persist_changes(&key);

        Ok(PersistentStateSupervisor::new(StateCell::new(
            self.service.clone(),
            key,
            Propagation::Broadcast,
            None,
        )))
    }

    /// State kept on this peer only, in its local store.
    pub async fn create_user_agent_state<T>(
        &self,
        key: StateKey,
        initial: T,
    ) -> Result<UserAgentStateSupervisor<T>, StateError>
    where
        T: Serialize + DeserializeOwned,
    {
        let initial = encode(&key, &initial)?;
        if self.service.get_cached_value(&key).is_none() {
            self.resolve_from(&self.user_agent, &key, initial, true).await?;
        }

        Ok(UserAgentStateSupervisor::new(StateCell::new(
            self.service.clone(),
            key,
            Propagation::Local,
            Some(self.user_agent.writer.clone()),
        )))
    }

    /// Wait for every queued store write to be attempted.
    pub async fn flush(&self) {
        self.persistent.writer.flush().await;
        self.user_agent.writer.flush().await;
    }

    async fn resolve_from(
        &self,
        backend: &Backend,
        key: &StateKey,
        initial: Value,
        write_initial: bool,
    ) -> Result<(), StateError> {
        let stored = backend.store.get(key.as_str()).await?;
        let from_store = stored.is_some();
        let candidate = stored.unwrap_or_else(|| initial.clone());

        // A value may have arrived while the store was read; it wins.
        let resolved = self.service.get_or_seed(key, candidate);
        debug!(key = %key, from_store = from_store, "State resolved");

        if !from_store && write_initial && resolved == initial {
            backend.writer.enqueue(key, initial);
        }
        Ok(())
    }

    fn persist_changes(&self, key: &StateKey) {
        if !self.persisted_keys.lock().insert(key.clone()) {
            return;
        }

        let role = self.service.endpoint().role().clone();
        let writer = self.persistent.writer.clone();
        self.service.subscribe(key, move |change| {
            if role.is_maestro() {
                writer.enqueue(&change.key, change.value.clone());
            } else {
                trace!(key = %change.key, "Not maestro, change not persisted");
            }
        });
    }
}

fn encode<T: Serialize>(key: &StateKey, value: &T) -> Result<Value, StateError> {
    serde_json::to_value(value).map_err(|e| StateError::serialization(key, e))
}
