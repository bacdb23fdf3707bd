//! Pending Request Store.
//!
//! Every outgoing `call` parks a oneshot sender here under the correlation id
//! it sent as the JSON-RPC `id`. An entry leaves the store exactly once:
//!
//! | Exit | Caller sees |
//! |------|-------------|
//! | response arrives (`complete`) | the response outcome |
//! | deadline passes (`remove_expired`) | `CallError::Timeout` |
//! | connection closes (`fail_all`) | `CallError::ConnectionLost` |
//! | caller drops its future (`cancel`) | nothing |

use crate::domain::errors::CallError;
use dashmap::DashMap;
use serde_json::Value;
use shared_types::CorrelationId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

/// What a waiting caller eventually receives.
pub type CallOutcome = Result<Value, CallError>;

struct PendingCall {
    method: String,
    sent_at: Instant,
    deadline: Instant,
    reply: oneshot::Sender<CallOutcome>,
}

impl PendingCall {
    fn timeout(&self) -> Duration {
        self.deadline.saturating_duration_since(self.sent_at)
    }
}

#[derive(Debug, Default)]
struct Counters {
    registered: AtomicU64,
    completed: AtomicU64,
    timed_out: AtomicU64,
    cancelled: AtomicU64,
    connection_lost: AtomicU64,
}

/// Point-in-time copy of the store's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingStats {
    pub registered: u64,
    pub completed: u64,
    pub timed_out: u64,
    /// Dropped by the caller, or answered after the caller went away.
    pub cancelled: u64,
    pub connection_lost: u64,
}

pub struct PendingRequestStore {
    calls: DashMap<CorrelationId, PendingCall>,
    default_timeout: Duration,
    counters: Counters,
}

impl PendingRequestStore {
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            calls: DashMap::new(),
            default_timeout,
            counters: Counters::default(),
        }
    }

    /// Park a new call. `timeout` falls back to the store default.
    pub fn register(
        &self,
        method: &str,
        timeout: Option<Duration>,
    ) -> (CorrelationId, oneshot::Receiver<CallOutcome>) {
        let id = CorrelationId::new();
        let (reply, rx) = oneshot::channel();
        let sent_at = Instant::now();

        self.calls.insert(
            id,
            PendingCall {
                method: method.to_string(),
                sent_at,
                deadline: sent_at + timeout.unwrap_or(self.default_timeout),
                reply,
            },
        );
        self.counters.registered.fetch_add(1, Ordering::Relaxed);
        trace!(correlation_id = %id, method = method, "Call parked");

        (id, rx)
    }

    /// Hand `outcome` to the caller waiting on `id`.
    ///
    /// Returns false if the id is unknown (late or foreign response) or the
    /// caller has already gone.
    pub fn complete(&self, id: CorrelationId, outcome: CallOutcome) -> bool {
        let Some((_, call)) = self.calls.remove(&id) else {
            debug!(correlation_id = %id, "Response for unknown or expired call");
            return false;
        };

        let elapsed_ms = call.sent_at.elapsed().as_millis();
        if call.reply.send(outcome).is_ok() {
            self.counters.completed.fetch_add(1, Ordering::Relaxed);
            debug!(correlation_id = %id, method = %call.method, elapsed_ms = elapsed_ms, "Call completed");
            true
        } else {
            self.counters.cancelled.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Fail every parked call with `ConnectionLost`. Returns how many.
    pub fn fail_all(&self) -> usize {
        let failed = self.settle_where(|_| true, |_| CallError::ConnectionLost);
        self.counters
            .connection_lost
            .fetch_add(failed as u64, Ordering::Relaxed);
        failed
    }

    /// Fail every call past its deadline with `Timeout`. Returns how many.
    pub fn remove_expired(&self) -> usize {
        let now = Instant::now();
        let expired = self.settle_where(
            |call| call.deadline <= now,
            |call| {
                warn!(method = %call.method, timeout = ?call.timeout(), "Call timed out");
                CallError::Timeout {
                    method: call.method.clone(),
                    after: call.timeout(),
                }
            },
        );
        self.counters
            .timed_out
            .fetch_add(expired as u64, Ordering::Relaxed);
        expired
    }

    /// Forget a call without answering it.
    pub fn cancel(&self, id: &CorrelationId) -> bool {
        let removed = self.calls.remove(id).is_some();
        if removed {
            self.counters.cancelled.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    pub fn is_pending(&self, id: &CorrelationId) -> bool {
        self.calls.contains_key(id)
    }

    pub fn pending_count(&self) -> usize {
        self.calls.len()
    }

    pub fn stats(&self) -> PendingStats {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        PendingStats {
            registered: load(&self.counters.registered),
            completed: load(&self.counters.completed),
            timed_out: load(&self.counters.timed_out),
            cancelled: load(&self.counters.cancelled),
            connection_lost: load(&self.counters.connection_lost),
        }
    }

    /// Remove the calls matching `select` and answer each with `error(call)`.
    fn settle_where<S, E>(&self, select: S, error: E) -> usize
    where
        S: Fn(&PendingCall) -> bool,
        E: Fn(&PendingCall) -> CallError,
    {
        let ids: Vec<CorrelationId> = self
            .calls
            .iter()
            .filter(|entry| select(entry.value()))
            .map(|entry| *entry.key())
            .collect();

        ids.into_iter()
            .filter_map(|id| self.calls.remove(&id))
            .map(|(_, call)| {
                let err = error(&call);
                let _ = call.reply.send(Err(err));
            })
            .count()
    }
}

/// Sweep expired calls every `interval`. Runs until aborted.
pub async fn cleanup_task(store: Arc<PendingRequestStore>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let expired = store.remove_expired();
        if expired > 0 {
            debug!(expired = expired, remaining = store.pending_count(), "Swept pending calls");
        }
    }
}
