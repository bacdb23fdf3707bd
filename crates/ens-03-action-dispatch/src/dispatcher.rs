//! # Action Dispatcher
//!
//! `create_action` turns a local async handler into an [`Action`]:
//!
//! ```text
//!            Action::call(args)
//!                   │
//!        ┌──────────┴───────────┐
//!   is maestro?             not maestro
//!        │                      │
//!   run handler            endpoint.call(method, args)
//!   in-process                  │ via relay
//!        │                      ▼
//!        │                maestro runs handler
//!        └──────────┬───────────┘
//!         Ok(result) | Err(..) → show_error + Err
//! ```
//!
//! The handler is also registered as an RPC method on this peer so that
//! followers can reach it when this peer is maestro. A handler may therefore
//! run for a direct call and again for a forwarded one; nothing deduplicates.
//!
//! On the follower path a bare string result is a failure message, not a
//! value. Actions should return structured results.

use crate::errors::{ActionError, HandlerError};
use crate::notifier::ErrorNotifier;
use ens_01_rpc::RpcEndpoint;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use shared_bus::{CoordinationEvent, EventPublisher};
use shared_types::{ErrorObject, ModuleScope};
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, warn};

type LocalHandler = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, ErrorObject>> + Send + Sync>;

/// Creates actions bound to one endpoint.
#[derive(Clone)]
pub struct ActionDispatcher {
    endpoint: Arc<RpcEndpoint>,
    notifier: Arc<dyn ErrorNotifier>,
    bus: Option<Arc<dyn EventPublisher>>,
}

impl ActionDispatcher {
    pub fn new(endpoint: Arc<RpcEndpoint>, notifier: Arc<dyn ErrorNotifier>) -> Self {
        Self {
            endpoint,
            notifier,
            bus: None,
        }
    }

    /// Also publish `ActionFailed` events.
    #[must_use]
    pub fn with_event_bus(mut self, bus: Arc<dyn EventPublisher>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn endpoint(&self) -> &Arc<RpcEndpoint> {
        &self.endpoint
    }

    /// Create an action named `<scope>|action|<name>` and register it as an
    /// RPC method.
    pub fn create_action<A, R, F, Fut>(&self, scope: &ModuleScope, name: &str, handler: F) -> Action<A, R>
    where
        A: Serialize + DeserializeOwned + Send + 'static,
        R: Serialize + DeserializeOwned + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, HandlerError>> + Send + 'static,
    {
        let method = scope.action_method(name);
        let handler = Arc::new(handler);

        let local: LocalHandler = Arc::new(move |params: Value| {
            let handler = Arc::clone(&handler);
            Box::pin(async move {
                let args: A = serde_json::from_value(params)
                    .map_err(|e| ErrorObject::invalid_params(e.to_string()))?;
                let result = handler(args).await.map_err(ErrorObject::from)?;
                serde_json::to_value(result).map_err(|e| ErrorObject::internal(e.to_string()))
            })
        });

        let remote = Arc::clone(&local);
        self.endpoint.register_method(method.clone(), move |params, ctx| {
            let remote = Arc::clone(&remote);
            async move {
                let outcome = remote(params).await;
                if let Err(e) = &outcome {
                    warn!(
                        method = %ctx.method,
                        caller = ?ctx.caller,
                        error = %e,
                        "Forwarded action failed"
                    );
                }
                outcome
            }
        });
        debug!(method = %method, "Action registered");

        Action {
            inner: Arc::new(ActionInner {
                method,
                local,
                dispatcher: self.clone(),
            }),
            _marker: PhantomData,
        }
    }
}

struct ActionInner {
    method: String,
    local: LocalHandler,
    dispatcher: ActionDispatcher,
}

/// Callable handle returned by [`ActionDispatcher::create_action`].
pub struct Action<A, R> {
    inner: Arc<ActionInner>,
    _marker: PhantomData<fn(A) -> R>,
}

impl<A, R> Clone for Action<A, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _marker: PhantomData,
        }
    }
}

impl<A, R> Action<A, R>
where
    A: Serialize,
    R: DeserializeOwned,
{
    /// Fully-qualified RPC method name.
    pub fn method(&self) -> &str {
        &self.inner.method
    }

    /// Run the action where it is authoritative.
    ///
    /// Failures are passed to the error notifier and returned.
    pub async fn call(&self, args: A) -> Result<R, ActionError> {
        let result = self.run(args).await;
        if let Err(e) = &result {
            self.report(e);
        }
        result
    }

    async fn run(&self, args: A) -> Result<R, ActionError> {
        let params = serde_json::to_value(args)?;
        let value = self.call_value(params).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn call_value(&self, params: Value) -> Result<Value, ActionError> {
        let inner = &self.inner;
        let endpoint = &inner.dispatcher.endpoint;

        if endpoint.is_maestro() {
            return (inner.local)(params)
                .await
                .map_err(|e| ActionError::Failed(e.message));
        }

        match endpoint.call(&inner.method, params).await? {
            Value::String(message) => Err(ActionError::Failed(message)),
            value => Ok(value),
        }
    }

    fn report(&self, error: &ActionError) {
        let dispatcher = &self.inner.dispatcher;
        let message = error.user_message();
        dispatcher.notifier.show_error(&message);
        if let Some(bus) = &dispatcher.bus {
            bus.publish(CoordinationEvent::ActionFailed {
                method: self.inner.method.clone(),
                message,
            });
        }
    }
}
