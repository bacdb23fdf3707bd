//! Module trait and the scoped API handed to each module.

use async_trait::async_trait;
use ens_03_action_dispatch::{Action, ActionDispatcher, HandlerError};
use ens_05_state_supervisor::{
    PersistentStateSupervisor, SharedStateSupervisor, StateError, StateFactory,
    UserAgentStateSupervisor,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_types::{ModuleScope, PeerId, StateKind};
use std::future::Future;
use std::sync::Arc;

use super::exports::ModuleExports;
use super::EngineError;

/// A unit of application logic registered with the engine.
#[async_trait]
pub trait Module: Send + Sync {
    /// Unique id; becomes the `engine|module|<id>` scope.
    fn id(&self) -> &str;

    /// Create this module's actions and state and publish its exports.
    async fn register(&self, api: &ModuleApi) -> Result<(), EngineError>;
}

/// Everything a module may create, scoped to its id.
#[derive(Clone)]
pub struct ModuleApi {
    scope: ModuleScope,
    dispatcher: ActionDispatcher,
    state: Arc<StateFactory>,
    exports: Arc<ModuleExports>,
}

impl ModuleApi {
    pub(crate) fn new(
        scope: ModuleScope,
        dispatcher: ActionDispatcher,
        state: Arc<StateFactory>,
        exports: Arc<ModuleExports>,
    ) -> Self {
        Self {
            scope,
            dispatcher,
            state,
            exports,
        }
    }

    pub fn scope(&self) -> &ModuleScope {
        &self.scope
    }

    /// This peer's id.
    pub fn peer_id(&self) -> &PeerId {
        self.dispatcher.endpoint().peer_id()
    }

    pub fn is_maestro(&self) -> bool {
        self.dispatcher.endpoint().is_maestro()
    }

    pub fn exports(&self) -> &ModuleExports {
        &self.exports
    }

    pub fn create_action<A, R, F, Fut>(&self, name: &str, handler: F) -> Action<A, R>
    where
        A: Serialize + DeserializeOwned + Send + 'static,
        R: Serialize + DeserializeOwned + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, HandlerError>> + Send + 'static,
    {
        self.dispatcher.create_action(&self.scope, name, handler)
    }

    pub fn create_shared_state<T>(
        &self,
        name: &str,
        initial: T,
    ) -> Result<SharedStateSupervisor<T>, StateError>
    where
        T: Serialize + DeserializeOwned,
    {
        self.state
            .create_shared_state(self.scope.state_key(StateKind::Shared, name), initial)
    }

    pub async fn create_persistent_state<T>(
        &self,
        name: &str,
        initial: T,
    ) -> Result<PersistentStateSupervisor<T>, StateError>
    where
        T: Serialize + DeserializeOwned,
    {
        self.state
            .create_persistent_state(self.scope.state_key(StateKind::Persistent, name), initial)
            .await
    }

    pub async fn create_user_agent_state<T>(
        &self,
        name: &str,
        initial: T,
    ) -> Result<UserAgentStateSupervisor<T>, StateError>
    where
        T: Serialize + DeserializeOwned,
    {
        self.state
            .create_user_agent_state(self.scope.state_key(StateKind::UserAgent, name), initial)
            .await
    }
}
