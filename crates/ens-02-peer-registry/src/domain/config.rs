//! Relay configuration with validation.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use thiserror::Error;

/// Default maximum message size (1MB)
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Default relay port.
pub const DEFAULT_PORT: u16 = 1337;

/// Configuration errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid limit: {0}")]
    InvalidLimit(String),
    #[error("Unknown maestro loss policy: {0}")]
    UnknownPolicy(String),
}

/// What the relay does when the maestro disconnects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaestroLossPolicy {
    /// Keep the maestro id. Requests are answered with "maestro unavailable"
    /// until a peer with that id reconnects.
    #[default]
    Reject,
    /// Promote the longest-connected remaining peer.
    PromoteNext,
}

impl FromStr for MaestroLossPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "reject" => Ok(Self::Reject),
            "promote_next" | "promote" => Ok(Self::PromoteNext),
            other => Err(ConfigError::UnknownPolicy(other.to_string())),
        }
    }
}

/// Relay server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Bind address
    pub host: IpAddr,
    /// Port (default: 1337)
    pub port: u16,
    pub maestro_loss: MaestroLossPolicy,
    /// Frames larger than this are answered with an invalid-request error.
    pub max_message_size: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: DEFAULT_PORT,
            maestro_loss: MaestroLossPolicy::default(),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl RegistryConfig {
    /// Loopback address with an OS-assigned port.
    pub fn local_ephemeral() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_message_size == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_message_size cannot be 0".into(),
            ));
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
