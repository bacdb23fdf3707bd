//! Domain layer for the RPC endpoint.

pub mod config;
pub mod errors;
pub mod pending;

pub use config::{ConfigError, EndpointConfig, ReconnectConfig, TransportConfig};
pub use errors::{CallError, TransportError};
pub use pending::{cleanup_task, CallOutcome, PendingRequestStore, PendingStats};
