//! Ordered write-through to a key-value store.
//!
//! One task per store drains a queue of writes, so writes reach the store in
//! the order they were enqueued and nobody waits on them.

use ens_04_shared_state::KvStore;
use serde_json::Value;
use shared_types::StateKey;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{trace, warn};

enum WriteOp {
    Set { key: StateKey, value: Value },
    Flush(oneshot::Sender<()>),
}

/// Handle to a store's writer task. The task exits once every handle is
/// dropped and the queue is drained.
#[derive(Clone)]
pub struct PersistWriter {
    tx: mpsc::UnboundedSender<WriteOp>,
    label: &'static str,
}

impl PersistWriter {
    /// Start the writer task. Must be called inside a Tokio runtime.
    pub fn spawn(store: Arc<dyn KvStore>, label: &'static str) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(writer_loop(store, rx, label));
        Self { tx, label }
    }

    /// Queue a write. Returns false if the writer task is gone.
    pub fn enqueue(&self, key: &StateKey, value: Value) -> bool {
        let queued = self
            .tx
            .send(WriteOp::Set {
                key: key.clone(),
                value,
            })
            .is_ok();
        if !queued {
            warn!(store = self.label, key = %key, "Writer stopped, write dropped");
        }
        queued
    }

    /// Wait until every write queued before this call has been attempted.
    pub async fn flush(&self) -> bool {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(WriteOp::Flush(done_tx)).is_err() {
            return false;
        }
        done_rx.await.is_ok()
    }
}

async fn writer_loop(
    store: Arc<dyn KvStore>,
    mut rx: mpsc::UnboundedReceiver<WriteOp>,
    label: &'static str,
) {
    while let Some(op) = rx.recv().await {
        match op {
            WriteOp::Set { key, value } => match store.set(key.as_str(), value).await {
                Ok(()) => trace!(store = label, key = %key, "Persisted"),
                Err(e) => warn!(store = label, key = %key, error = %e, "Persist failed"),
            },
            WriteOp::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    trace!(store = label, "Writer stopped");
}
