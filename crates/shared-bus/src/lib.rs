//! # Shared Bus - Local Event Bus
//!
//! In-process notifications about coordination activity: peers joining and
//! leaving the relay, maestro changes, state cache updates and failed actions.
//! The bus is an observation channel only. Nothing on it is required for
//! correctness and nothing on it crosses the network.
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │ PeerRegistry │                    │  Dashboard / │
//! │ SharedState  │    publish()       │  Tests       │
//! │ Dispatcher   │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │  Event Bus   │          │
//!                  │              │ ─────────┘
//!                  └──────────────┘  subscribe()
//! ```

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use events::{CoordinationEvent, EventFilter, EventTopic};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{EventStream, Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before it starts lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
