//! Live view of one state key for a rendering layer.

use ens_04_shared_state::{SharedStateService, SubscriptionId};
use futures::Stream;
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared_types::StateKey;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tracing::warn;

/// The value at attach time plus every later value, until dropped.
///
/// A change that lands while the attachment opens is reported once, as
/// `initial`: a first streamed value equal to `initial` is skipped. Dropping
/// the attachment removes its subscription.
pub struct Attachment<T> {
    initial: T,
    /// Raw initial value, until the first streamed value is checked against it.
    pending_initial: Option<Value>,
    key: StateKey,
    service: Arc<SharedStateService>,
    subscription: SubscriptionId,
    rx: mpsc::UnboundedReceiver<Value>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Unpin for Attachment<T> {}

impl<T: DeserializeOwned> Attachment<T> {
    /// Subscribe to `key`, then read the initial value, so no change can
    /// fall between the two. `read_initial` returns the cached value as
    /// stored and decoded.
    pub(crate) fn open<E>(
        service: Arc<SharedStateService>,
        key: StateKey,
        read_initial: impl FnOnce() -> Result<(Value, T), E>,
    ) -> Result<Self, E> {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = service.subscribe(&key, move |change| {
            let _ = tx.send(change.value.clone());
        });

        match read_initial() {
            Ok((raw, initial)) => Ok(Self {
                initial,
                pending_initial: Some(raw),
                key,
                service,
                subscription,
                rx,
                _marker: PhantomData,
            }),
            Err(e) => {
                service.unsubscribe(&key, subscription);
                Err(e)
            }
        }
    }

    pub fn initial(&self) -> &T {
        &self.initial
    }

    pub fn key(&self) -> &StateKey {
        &self.key
    }

    /// Next value. Values that do not decode as `T` are skipped.
    pub async fn next_value(&mut self) -> Option<T> {
        loop {
            let value = self.rx.recv().await?;
            if let Some(decoded) = self.accept(value) {
                return Some(decoded);
            }
        }
    }

    /// Detach explicitly.
    pub fn detach(self) {}

    /// Decode a streamed value, dropping a first value that repeats `initial`.
    fn accept(&mut self, value: Value) -> Option<T> {
        if self.pending_initial.take().is_some_and(|raw| raw == value) {
            return None;
        }
        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!(key = %self.key, error = %e, "Skipping undecodable state value");
                None
            }
        }
    }
}

impl<T: DeserializeOwned> Stream for Attachment<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        let this = self.get_mut();
        loop {
            match this.rx.poll_recv(cx) {
                Poll::Ready(Some(value)) => {
                    if let Some(decoded) = this.accept(value) {
                        return Poll::Ready(Some(decoded));
                    }
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl<T> Drop for Attachment<T> {
    fn drop(&mut self) {
        self.service.unsubscribe(&self.key, self.subscription);
    }
}
