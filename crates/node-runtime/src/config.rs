//! # Node Configuration
//!
//! Environment-driven configuration for the `ensemble-node` binary.
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `ENS_HOST` | `0.0.0.0` | Relay bind address |
//! | `ENS_PORT` | `1337` | Relay port |
//! | `ENS_MAESTRO_LOSS` | `reject` | `reject` or `promote_next` |
//! | `ENS_EMBEDDED_PEER` | `false` | Also run a peer engine in this process |
//! | `ENS_PEER_ID` | generated | Embedded peer id |
//! | `ENS_MAESTRO` | `true` | Embedded peer claims maestro |
//! | `ENS_DATA_FILE` | none | JSON file backing persistent state |
//! | `ENS_CALL_TIMEOUT` | `30s` | Default RPC call timeout |

use ens_01_rpc::EndpointConfig;
use ens_02_peer_registry::{MaestroLossPolicy, RegistryConfig};
use shared_types::humantime_serde::parse_duration;
use shared_types::PeerId;
use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: &'static str, message: String },

    #[error(transparent)]
    Relay(#[from] ens_02_peer_registry::ConfigError),

    #[error(transparent)]
    Endpoint(#[from] ens_01_rpc::ConfigError),
}

/// Complete node configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub relay: RegistryConfig,
    pub endpoint: EndpointConfig,
    /// Run a peer engine next to the relay.
    pub embedded_peer: bool,
    /// Id of the embedded peer. Generated when absent.
    pub peer_id: Option<PeerId>,
    /// Whether the embedded peer claims maestro on connect.
    pub is_maestro: bool,
    /// Where persistent state is stored. In memory when absent.
    pub data_file: Option<PathBuf>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            relay: RegistryConfig::default(),
            endpoint: EndpointConfig::default(),
            embedded_peer: false,
            peer_id: None,
            is_maestro: true,
            data_file: None,
        }
    }
}

impl NodeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(host) = lookup("ENS_HOST") {
            config.relay.host = host.parse::<IpAddr>().map_err(|e| invalid("ENS_HOST", e))?;
        }
        if let Some(port) = lookup("ENS_PORT") {
            config.relay.port = port.parse().map_err(|e| invalid("ENS_PORT", e))?;
        }
        if let Some(policy) = lookup("ENS_MAESTRO_LOSS") {
            config.relay.maestro_loss = policy.parse::<MaestroLossPolicy>()?;
        }
        if let Some(timeout) = lookup("ENS_CALL_TIMEOUT") {
            config.endpoint.call_timeout =
                parse_duration(&timeout).map_err(|e| invalid("ENS_CALL_TIMEOUT", e))?;
        }
        if let Some(flag) = lookup("ENS_EMBEDDED_PEER") {
            config.embedded_peer = parse_flag("ENS_EMBEDDED_PEER", &flag)?;
        }
        if let Some(flag) = lookup("ENS_MAESTRO") {
            config.is_maestro = parse_flag("ENS_MAESTRO", &flag)?;
        }
        config.peer_id = lookup("ENS_PEER_ID")
            .filter(|id| !id.trim().is_empty())
            .map(PeerId::new);
        config.data_file = lookup("ENS_DATA_FILE").map(PathBuf::from);

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.relay.validate()?;
        self.endpoint.validate()?;
        Ok(())
    }

    /// URL a peer in this process uses to reach the relay bound at `addr`.
    pub fn local_relay_url(addr: SocketAddr) -> String {
        let host = if addr.ip().is_unspecified() {
            "127.0.0.1".to_string()
        } else {
            addr.ip().to_string()
        };
        format!("ws://{}:{}/ws", host, addr.port())
    }
}

fn invalid(var: &'static str, error: impl std::fmt::Display) -> ConfigError {
    ConfigError::InvalidValue {
        var,
        message: error.to_string(),
    }
}

fn parse_flag(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(invalid(var, format!("expected a boolean, got {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    fn from(vars: &[(&str, &str)]) -> Result<NodeConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        NodeConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = from(&[]).unwrap();
        assert_eq!(config.relay.port, 1337);
        assert_eq!(config.relay.maestro_loss, MaestroLossPolicy::Reject);
        assert_eq!(config.endpoint.call_timeout, Duration::from_secs(30));
        assert!(!config.embedded_peer);
        assert!(config.peer_id.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = from(&[
            ("ENS_HOST", "127.0.0.1"),
            ("ENS_PORT", "9000"),
            ("ENS_MAESTRO_LOSS", "promote-next"),
            ("ENS_CALL_TIMEOUT", "250ms"),
            ("ENS_EMBEDDED_PEER", "true"),
            ("ENS_MAESTRO", "0"),
            ("ENS_PEER_ID", "stage-left"),
            ("ENS_DATA_FILE", "/tmp/ensemble.json"),
        ])
        .unwrap();

        assert_eq!(config.relay.socket_addr().to_string(), "127.0.0.1:9000");
        assert_eq!(config.relay.maestro_loss, MaestroLossPolicy::PromoteNext);
        assert_eq!(config.endpoint.call_timeout, Duration::from_millis(250));
        assert!(config.embedded_peer);
        assert!(!config.is_maestro);
        assert_eq!(config.peer_id, Some(PeerId::from("stage-left")));
        assert_eq!(config.data_file, Some(PathBuf::from("/tmp/ensemble.json")));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            from(&[("ENS_PORT", "not-a-port")]),
            Err(ConfigError::InvalidValue { var: "ENS_PORT", .. })
        ));
        assert!(matches!(
            from(&[("ENS_MAESTRO_LOSS", "elect")]),
            Err(ConfigError::Relay(_))
        ));
        assert!(matches!(
            from(&[("ENS_CALL_TIMEOUT", "0s")]),
            Err(ConfigError::Endpoint(_))
        ));
        assert!(matches!(
            from(&[("ENS_EMBEDDED_PEER", "maybe")]),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_local_relay_url() {
        let addr: SocketAddr = "0.0.0.0:1337".parse().unwrap();
        assert_eq!(NodeConfig::local_relay_url(addr), "ws://127.0.0.1:1337/ws");
    }
}
