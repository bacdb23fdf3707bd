//! Transport and endpoint configuration with validation.

use serde::{Deserialize, Serialize};
use shared_types::PeerId;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Configuration errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Invalid timeout: {0}")]
    InvalidTimeout(String),
    #[error("Invalid reconnect policy: {0}")]
    InvalidReconnect(String),
}

/// Client side of one peer connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Relay endpoint, e.g. `ws://127.0.0.1:1337/ws`.
    pub url: String,
    /// Presented as `clientId` on every (re)connect.
    pub peer_id: PeerId,
    /// Sends `is_maestro=true` when set.
    #[serde(default)]
    pub is_maestro: bool,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

impl TransportConfig {
    pub fn new(url: impl Into<String>, peer_id: PeerId) -> Self {
        Self {
            url: url.into(),
            peer_id,
            is_maestro: false,
            reconnect: ReconnectConfig::default(),
        }
    }

    #[must_use]
    pub fn as_maestro(mut self) -> Self {
        self.is_maestro = true;
        self
    }

    #[must_use]
    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.parse_url()?;
        self.reconnect.validate()
    }

    /// The URL with `clientId` and `is_maestro` query parameters appended.
    pub fn connect_url(&self) -> Result<Url, ConfigError> {
        let mut url = self.parse_url()?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("clientId", self.peer_id.as_str());
            if self.is_maestro {
                query.append_pair("is_maestro", "true");
            }
        }
        Ok(url)
    }

    fn parse_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", self.url, e)))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(ConfigError::InvalidUrl(format!(
                "expected ws or wss scheme, got {}",
                url.scheme()
            )));
        }
        if url.fragment().is_some() {
            return Err(ConfigError::InvalidUrl(format!(
                "fragments are not allowed in {}",
                self.url
            )));
        }
        Ok(url)
    }
}

/// Reconnect backoff.
///
/// With `max_delay == initial_delay` every retry waits the same time (the
/// default, 5 s). A larger `max_delay` doubles the wait per attempt up to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    #[serde(with = "shared_types::humantime_serde")]
    pub initial_delay: Duration,
    #[serde(with = "shared_types::humantime_serde")]
    pub max_delay: Duration,
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(5),
            max_attempts: None,
        }
    }
}

impl ReconnectConfig {
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            max_delay: delay,
            max_attempts: None,
        }
    }

    pub fn exponential(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay,
            max_attempts: None,
        }
    }

    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_delay.is_zero() {
            return Err(ConfigError::InvalidReconnect(
                "initial_delay cannot be 0".into(),
            ));
        }
        if self.max_delay < self.initial_delay {
            return Err(ConfigError::InvalidReconnect(
                "max_delay must be >= initial_delay".into(),
            ));
        }
        if self.max_attempts == Some(0) {
            return Err(ConfigError::InvalidReconnect(
                "max_attempts cannot be 0".into(),
            ));
        }
        Ok(())
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if self.max_delay <= self.initial_delay {
            return self.initial_delay;
        }
        let factor = 1u32 << attempt.saturating_sub(1).min(6);
        std::cmp::min(self.initial_delay.saturating_mul(factor), self.max_delay)
    }

    pub fn exhausted(&self, attempts: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
    }
}

/// RPC endpoint behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Default timeout for `call`.
    #[serde(with = "shared_types::humantime_serde")]
    pub call_timeout: Duration,
    /// How often expired pending calls are swept.
    #[serde(with = "shared_types::humantime_serde")]
    pub cleanup_interval: Duration,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(30),
            cleanup_interval: Duration::from_secs(10),
        }
    }
}

impl EndpointConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.call_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "call_timeout cannot be 0".into(),
            ));
        }
        if self.cleanup_interval.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "cleanup_interval cannot be 0".into(),
            ));
        }
        Ok(())
    }
}
