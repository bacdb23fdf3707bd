//! # Event Publisher
//!
//! The relay, the state service and the dispatcher hold an
//! `Arc<dyn EventPublisher>`; whoever wants to watch holds the concrete
//! [`InMemoryEventBus`] and subscribes.

use crate::events::{CoordinationEvent, EventFilter, EventTopic};
use crate::subscriber::{EventStream, Subscription};
use crate::DEFAULT_CHANNEL_CAPACITY;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::trace;

/// Publishing side of the bus.
///
/// Publishing never blocks and never fails: callers sit on hot paths (the
/// relay loop, state callbacks) and an event with no listener is simply lost.
pub trait EventPublisher: Send + Sync {
    /// Publish `event`. Returns how many subscribers were listening.
    fn publish(&self, event: CoordinationEvent) -> usize;

    /// Events published since creation, listened to or not.
    fn events_published(&self) -> u64;
}

/// Per-topic publish counters.
#[derive(Debug, Default)]
struct TopicCounters {
    registry: AtomicU64,
    state: AtomicU64,
    actions: AtomicU64,
}

impl TopicCounters {
    fn slot(&self, topic: EventTopic) -> Option<&AtomicU64> {
        match topic {
            EventTopic::Registry => Some(&self.registry),
            EventTopic::State => Some(&self.state),
            EventTopic::Actions => Some(&self.actions),
            EventTopic::All => None,
        }
    }

    fn bump(&self, topic: EventTopic) {
        if let Some(slot) = self.slot(topic) {
            slot.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn get(&self, topic: EventTopic) -> u64 {
        match self.slot(topic) {
            Some(slot) => slot.load(Ordering::Relaxed),
            None => self.total(),
        }
    }

    fn total(&self) -> u64 {
        self.registry.load(Ordering::Relaxed)
            + self.state.load(Ordering::Relaxed)
            + self.actions.load(Ordering::Relaxed)
    }
}

/// Broadcast-channel bus shared by every component of one process.
///
/// A subscriber that falls more than `capacity` events behind skips the
/// oldest ones.
pub struct InMemoryEventBus {
    sender: broadcast::Sender<CoordinationEvent>,
    counters: TopicCounters,
    capacity: usize,
}

impl InMemoryEventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            counters: TopicCounters::default(),
            capacity: capacity.max(1),
        }
    }

    /// Events published from now on that pass `filter`.
    #[must_use]
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        trace!(topics = ?filter.topics, "Bus subscription opened");
        Subscription::new(self.sender.subscribe(), filter)
    }

    /// Like [`subscribe`](Self::subscribe), as a `Stream`.
    #[must_use]
    pub fn event_stream(&self, filter: EventFilter) -> EventStream {
        EventStream::new(self.sender.subscribe(), filter)
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Events published on `topic`. [`EventTopic::All`] gives the total.
    #[must_use]
    pub fn published_on(&self, topic: EventTopic) -> u64 {
        self.counters.get(topic)
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventPublisher for InMemoryEventBus {
    fn publish(&self, event: CoordinationEvent) -> usize {
        let topic = event.topic();
        self.counters.bump(topic);

        // `send` only fails when nobody is subscribed.
        let receivers = self.sender.send(event).unwrap_or(0);
        trace!(topic = ?topic, receivers = receivers, "Coordination event");
        receivers
    }

    fn events_published(&self) -> u64 {
        self.counters.total()
    }
}
