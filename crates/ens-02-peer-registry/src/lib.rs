//! # Peer Registry & Relay (ens-02)
//!
//! The server side of the coordination layer. Every peer holds one WebSocket
//! connection to the relay; the relay never executes application logic. It
//! only decides where each frame goes.
//!
//! ## Architecture
//!
//! ```text
//!   peer B ──┐                       ┌── peer C
//!            │   ┌───────────────┐   │
//!            └──►│  RelayServer  │◄──┘
//!                │  /ws  /health │
//!                └───────┬───────┘
//!                        │ relay()
//!                ┌───────▼───────┐
//!                │ PeerRegistry  │── maestro: Option<PeerId>
//!                └───────┬───────┘
//!                        │ forward / route / fan-out
//!                     peer A (maestro)
//! ```
//!
//! ## Maestro loss
//!
//! Governed by [`MaestroLossPolicy`]: `Reject` keeps the id and answers
//! requests with a "maestro unavailable" error until that peer reconnects;
//! `PromoteNext` hands authority to the longest-connected remaining peer.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod domain;
pub mod registry;
pub mod service;
pub mod ws;

pub use domain::{
    ConfigError, DropReason, MaestroLossPolicy, RegistryConfig, RegistryError, RelayOutcome,
};
pub use registry::{PeerRegistry, PeerSnapshot, Registration};
pub use service::RelayServer;
