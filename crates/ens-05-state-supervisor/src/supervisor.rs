//! # State Supervisors
//!
//! Per-key typed handles over the shared state cache.
//!
//! | Supervisor | Propagation | Durable write |
//! |------------|-------------|---------------|
//! | [`SharedStateSupervisor`] | broadcast | none |
//! | [`PersistentStateSupervisor`] | broadcast | maestro's store, via [`StateFactory`](crate::StateFactory) |
//! | [`UserAgentStateSupervisor`] | this peer only | this peer's store |
//!
//! Reads always come from the cache. Writes update the cache synchronously,
//! so `get_state` right after `set_state` returns the new value.

use crate::attachment::Attachment;
use crate::errors::StateError;
use crate::writer::PersistWriter;
use ens_04_shared_state::SharedStateService;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use shared_types::StateKey;
use std::marker::PhantomData;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Propagation {
    Broadcast,
    Local,
}

/// A key bound to the state service, with how its writes travel.
pub struct StateCell {
    service: Arc<SharedStateService>,
    key: StateKey,
    propagation: Propagation,
    writer: Option<PersistWriter>,
}

impl StateCell {
    pub(crate) fn new(
        service: Arc<SharedStateService>,
        key: StateKey,
        propagation: Propagation,
        writer: Option<PersistWriter>,
    ) -> Self {
        Self {
            service,
            key,
            propagation,
            writer,
        }
    }

    pub fn key(&self) -> &StateKey {
        &self.key
    }

    fn read<T: DeserializeOwned>(&self) -> Result<T, StateError> {
        self.read_raw().map(|(_, decoded)| decoded)
    }

    /// The cached value both as stored and decoded.
    fn read_raw<T: DeserializeOwned>(&self) -> Result<(Value, T), StateError> {
        let value = self
            .service
            .get_cached_value(&self.key)
            .ok_or_else(|| StateError::Uninitialised(self.key.clone()))?;
        let decoded = serde_json::from_value(value.clone())
            .map_err(|e| StateError::serialization(&self.key, e))?;
        Ok((value, decoded))
    }

    fn write<T: Serialize>(&self, value: &T) -> Result<(), StateError> {
        let value =
            serde_json::to_value(value).map_err(|e| StateError::serialization(&self.key, e))?;

        if let Some(writer) = &self.writer {
            writer.enqueue(&self.key, value.clone());
        }
        match self.propagation {
            Propagation::Broadcast => {
                self.service.send_rpc_set_shared_state(&self.key, value);
            }
            Propagation::Local => self.service.set_local(&self.key, value),
        }
        Ok(())
    }
}

/// get/set/attach contract shared by every supervisor.
pub trait StateSupervisor<T>: Send + Sync
where
    T: Serialize + DeserializeOwned,
{
    fn cell(&self) -> &StateCell;

    fn key(&self) -> &StateKey {
        self.cell().key()
    }

    /// Current value from the cache.
    fn get_state(&self) -> Result<T, StateError> {
        self.cell().read()
    }

    fn set_state(&self, value: T) -> Result<(), StateError> {
        self.cell().write(&value)
    }

    /// Set the state to `update(previous)` and return the new value.
    fn set_state_with<F>(&self, update: F) -> Result<T, StateError>
    where
        F: FnOnce(T) -> T,
        Self: Sized,
    {
        let next = update(self.get_state()?);
        self.cell().write(&next)?;
        Ok(next)
    }

    /// Current value plus a stream of later values.
    fn attach(&self) -> Result<Attachment<T>, StateError> {
        let cell = self.cell();
        Attachment::open(cell.service.clone(), cell.key.clone(), || cell.read_raw())
    }
}

macro_rules! supervisor {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        pub struct $name<T> {
            cell: Arc<StateCell>,
            _marker: PhantomData<fn() -> T>,
        }

        impl<T> $name<T> {
            pub(crate) fn new(cell: StateCell) -> Self {
                Self {
                    cell: Arc::new(cell),
                    _marker: PhantomData,
                }
            }
        }

        impl<T> Clone for $name<T> {
            fn clone(&self) -> Self {
                Self {
                    cell: Arc::clone(&self.cell),
                    _marker: PhantomData,
                }
            }
        }

        impl<T> StateSupervisor<T> for $name<T>
        where
            T: Serialize + DeserializeOwned,
        {
            fn cell(&self) -> &StateCell {
                &self.cell
            }
        }
    };
}

supervisor!(
    /// State broadcast to every peer.
    SharedStateSupervisor
);

supervisor!(
    /// Broadcast state that the maestro also writes to its durable store.
    PersistentStateSupervisor
);

supervisor!(
    /// State private to this peer, kept in its local store.
    UserAgentStateSupervisor
);
