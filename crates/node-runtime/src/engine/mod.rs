//! # Engine
//!
//! Explicit bootstrap for a peer: modules are handed to an [`EngineBuilder`]
//! and registered, in order, when the engine is built.
//!
//! ```text
//! EngineBuilder::new(transport)
//!     .register_module(SystemModule)
//!     .register_module(MyModule::new())
//!     .build().await?
//!          │
//!          ├─ connect endpoint to the relay, wait for its role announcement
//!          ├─ shared state service (+ preload from the persistent store)
//!          ├─ state factory, action dispatcher, exports
//!          └─ Module::register(&ModuleApi) for each module
//! ```

pub mod exports;
pub mod module;
pub mod system;

use ens_01_rpc::{EndpointConfig, RpcEndpoint, TransportConfig, WsTransport};
use ens_03_action_dispatch::{ActionDispatcher, ErrorNotifier, LogErrorNotifier};
use ens_04_shared_state::{InMemoryKvStore, KvStore, SharedStateService, StoreError};
use ens_05_state_supervisor::{StateError, StateFactory};
use shared_bus::{EventPublisher, InMemoryEventBus};
use shared_types::{ModuleScope, PeerId};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

pub use exports::ModuleExports;
pub use module::{Module, ModuleApi};
pub use system::{Ping, Pong, SystemActions, SystemModule, SYSTEM_MODULE_ID};

/// How long `build` waits for the relay to announce this peer's role when no
/// connect timeout is set.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ens_01_rpc::ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Module {0} registered twice")]
    DuplicateModule(String),

    #[error("Module {module} failed to register: {message}")]
    Module { module: String, message: String },

    #[error("No export of type {0}")]
    MissingExport(&'static str),
}

pub struct EngineBuilder {
    transport: TransportConfig,
    endpoint: EndpointConfig,
    modules: Vec<Box<dyn Module>>,
    notifier: Arc<dyn ErrorNotifier>,
    persistent_store: Option<Arc<dyn KvStore>>,
    user_agent_store: Option<Arc<dyn KvStore>>,
    bus: Option<Arc<InMemoryEventBus>>,
    connect_timeout: Option<Duration>,
}

impl EngineBuilder {
    pub fn new(transport: TransportConfig) -> Self {
        Self {
            transport,
            endpoint: EndpointConfig::default(),
            modules: Vec::new(),
            notifier: Arc::new(LogErrorNotifier),
            persistent_store: None,
            user_agent_store: None,
            bus: None,
            connect_timeout: None,
        }
    }

    #[must_use]
    pub fn endpoint_config(mut self, config: EndpointConfig) -> Self {
        self.endpoint = config;
        self
    }

    /// Modules register in the order they are added.
    #[must_use]
    pub fn register_module(mut self, module: impl Module + 'static) -> Self {
        self.modules.push(Box::new(module));
        self
    }

    #[must_use]
    pub fn error_notifier(mut self, notifier: Arc<dyn ErrorNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Durable store behind persistent state. In memory by default.
    #[must_use]
    pub fn persistent_store(mut self, store: Arc<dyn KvStore>) -> Self {
        self.persistent_store = Some(store);
        self
    }

    /// This peer's local store behind user-agent state. In memory by default.
    #[must_use]
    pub fn user_agent_store(mut self, store: Arc<dyn KvStore>) -> Self {
        self.user_agent_store = Some(store);
        self
    }

    #[must_use]
    pub fn event_bus(mut self, bus: Arc<InMemoryEventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Wait up to `timeout` for the relay to connect and announce this
    /// peer's role before registering modules. Defaults to
    /// [`DEFAULT_CONNECT_TIMEOUT`]. On timeout the engine registers with the
    /// role it asked for and keeps connecting in the background.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub async fn build(self) -> Result<Engine, EngineError> {
        let mut seen = HashSet::new();
        for module in &self.modules {
            if !seen.insert(module.id().to_string()) {
                return Err(EngineError::DuplicateModule(module.id().to_string()));
            }
        }

        let bus = self.bus.unwrap_or_else(|| Arc::new(InMemoryEventBus::new()));
        let publisher: Arc<dyn EventPublisher> = bus.clone();

        let (endpoint, transport) = ens_01_rpc::connect(self.transport, self.endpoint)?;
        let timeout = self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT);
        if !endpoint.role().wait_announced(timeout).await {
            warn!(
                peer_id = %endpoint.peer_id(),
                ?timeout,
                connected = endpoint.is_connected(),
                "No role announcement from relay, registering with requested role"
            );
        }

        let persistent_store = self
            .persistent_store
            .unwrap_or_else(|| Arc::new(InMemoryKvStore::new()));
        let user_agent_store = self
            .user_agent_store
            .unwrap_or_else(|| Arc::new(InMemoryKvStore::new()));

        let service = SharedStateService::new(endpoint.clone(), Some(publisher.clone()));
        service.preload(persistent_store.as_ref()).await?;

        let state = Arc::new(StateFactory::new(
            service.clone(),
            persistent_store,
            user_agent_store,
        ));
        let dispatcher =
            ActionDispatcher::new(endpoint.clone(), self.notifier).with_event_bus(publisher);
        let exports = Arc::new(ModuleExports::new());

        let engine = Engine {
            endpoint,
            transport,
            service,
            state,
            dispatcher,
            exports,
            bus,
            modules: self.modules.iter().map(|m| m.id().to_string()).collect(),
        };

        for module in &self.modules {
            let api = engine.api(module.id());
            module.register(&api).await.map_err(|e| match e {
                EngineError::Module { .. } => e,
                other => EngineError::Module {
                    module: module.id().to_string(),
                    message: other.to_string(),
                },
            })?;
            info!(module = module.id(), "Module registered");
        }

        info!(
            peer_id = %engine.peer_id(),
            modules = engine.modules.len(),
            maestro = engine.is_maestro(),
            "Engine started"
        );
        Ok(engine)
    }
}

/// A running peer.
pub struct Engine {
    endpoint: Arc<RpcEndpoint>,
    transport: Arc<WsTransport>,
    service: Arc<SharedStateService>,
    state: Arc<StateFactory>,
    dispatcher: ActionDispatcher,
    exports: Arc<ModuleExports>,
    bus: Arc<InMemoryEventBus>,
    modules: Vec<String>,
}

impl Engine {
    pub fn peer_id(&self) -> &PeerId {
        self.endpoint.peer_id()
    }

    pub fn is_maestro(&self) -> bool {
        self.endpoint.is_maestro()
    }

    pub fn is_connected(&self) -> bool {
        self.endpoint.is_connected()
    }

    pub fn endpoint(&self) -> &Arc<RpcEndpoint> {
        &self.endpoint
    }

    pub fn shared_state(&self) -> &Arc<SharedStateService> {
        &self.service
    }

    pub fn exports(&self) -> &Arc<ModuleExports> {
        &self.exports
    }

    pub fn event_bus(&self) -> &Arc<InMemoryEventBus> {
        &self.bus
    }

    pub fn modules(&self) -> &[String] {
        &self.modules
    }

    /// API scoped to `module_id`, for host code outside a [`Module`].
    pub fn api(&self, module_id: &str) -> ModuleApi {
        ModuleApi::new(
            ModuleScope::new(module_id),
            self.dispatcher.clone(),
            self.state.clone(),
            self.exports.clone(),
        )
    }

    /// Wait until the relay's role announcement makes this peer maestro.
    pub async fn wait_until_maestro(&self, timeout: Duration) -> bool {
        self.endpoint
            .role()
            .wait_for(shared_types::PeerRole::Maestro, timeout)
            .await
    }

    /// Flush pending store writes and disconnect.
    pub async fn shutdown(&self) {
        self.state.flush().await;
        self.transport.close();
        self.endpoint.shutdown();
        info!(peer_id = %self.peer_id(), "Engine stopped");
    }
}
