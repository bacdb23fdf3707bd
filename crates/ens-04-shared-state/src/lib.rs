//! # Shared State Service (ens-04)
//!
//! The authoritative in-memory cache of named state values on each peer, and
//! the `shared_state.set` notification that keeps caches convergent.
//!
//! The cache is the only source for "current value" reads. Durable storage
//! sits behind the [`KvStore`] port and is only consulted to warm the cache.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod adapters;
pub mod errors;
pub mod ports;
pub mod service;

pub use adapters::InMemoryKvStore;
pub use errors::StoreError;
pub use ports::KvStore;
pub use service::{
    SetSharedState, SharedStateService, StateCallback, StateChange, SubscriptionId,
    SET_SHARED_STATE_METHOD,
};
