//! # Action Dispatcher (ens-03)
//!
//! Guarantees that side-effecting module logic runs on exactly one peer, the
//! maestro, no matter which peer triggers it.
//!
//! ```ignore
//! let play = dispatcher.create_action(&scope, "play", |args: PlayNote| async move {
//!     piano.play(args.note).map_err(|e| HandlerError::new(e.to_string()))
//! });
//! play.call(PlayNote { note: 60 }).await?;
//! ```

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod dispatcher;
pub mod errors;
pub mod notifier;

pub use dispatcher::{Action, ActionDispatcher};
pub use errors::{ActionError, HandlerError};
pub use notifier::{ErrorNotifier, LogErrorNotifier};
