pub mod config;
pub mod errors;

pub use config::{ConfigError, MaestroLossPolicy, RegistryConfig, DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_PORT};
pub use errors::{DropReason, RegistryError, RelayOutcome};
