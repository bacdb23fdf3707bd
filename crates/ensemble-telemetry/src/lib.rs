//! # Ensemble Telemetry
//!
//! Structured logging for relay and peer processes, built on `tracing`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ensemble_telemetry::{init_logging, TelemetryConfig};
//!
//! let config = TelemetryConfig::from_env();
//! init_logging(&config)?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `ENS_LOG_LEVEL` / `RUST_LOG` | `info` | Log filter |
//! | `ENS_JSON_LOGS` | `false` (`true` in containers) | JSON output |
//! | `ENS_CONSOLE_OUTPUT` | `true` | Console output |
//! | `ENS_SERVICE_NAME` | `ensemble` | Service name |

mod config;
mod logging;

pub use config::TelemetryConfig;
pub use logging::{init_logging, try_init_test_logging};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid log filter: {0}")]
    Filter(String),

    #[error("Global subscriber already installed: {0}")]
    AlreadyInitialized(String),
}

/// Log a peer-related event with standard fields.
///
/// ```rust,ignore
/// log_peer_event!(info, "registry", "Peer connected", peer_id, is_maestro = true);
/// ```
#[macro_export]
macro_rules! log_peer_event {
    ($level:ident, $component:expr, $msg:expr, $peer_id:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            component = $component,
            peer_id = %$peer_id,
            $($($field)*,)?
            $msg
        )
    };
}
