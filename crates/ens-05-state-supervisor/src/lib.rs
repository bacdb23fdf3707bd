//! # State Supervisors (ens-05)
//!
//! Typed per-key handles for application code and rendering layers:
//!
//! ```ignore
//! let score = factory.create_shared_state(scope.state_key(StateKind::Shared, "score"), 0u32)?;
//! score.set_state_with(|s| s + 1)?;
//!
//! let mut view = score.attach()?;
//! render(view.initial());
//! while let Some(next) = view.next().await {
//!     render(&next);
//! }
//! ```
//!
//! Store writes go through one [`PersistWriter`] task per store, so they land
//! in issue order and reads never wait on them.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod attachment;
pub mod errors;
pub mod factory;
pub mod supervisor;
pub mod writer;

pub use attachment::Attachment;
pub use errors::StateError;
pub use factory::StateFactory;
pub use supervisor::{
    PersistentStateSupervisor, SharedStateSupervisor, StateCell, StateSupervisor,
    UserAgentStateSupervisor,
};
pub use writer::PersistWriter;
