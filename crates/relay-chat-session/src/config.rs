//! Client configuration.

use relay_chat_core::{Endpoint, EndpointError};
use serde::Deserialize;

/// Environment variable holding the endpoint base.
pub const ENDPOINT_VAR: &str = "RELAY_CHAT_ENDPOINT";

/// Environment variable overriding the liveness probe.
pub const PROBE_VAR: &str = "RELAY_CHAT_PROBE";

/// Endpoint used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "ws://127.0.0.1:8000/test/ws-chatbot";

/// Text frame sent right after a channel opens. Never logged.
pub const DEFAULT_LIVENESS_PROBE: &str = "hi";

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid RELAY_CHAT_ENDPOINT: {0}")]
    Endpoint(#[from] EndpointError),
    #[error("RELAY_CHAT_PROBE must not be empty")]
    EmptyProbe,
}

/// Settings for one session controller.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base address; the session identity is appended per channel.
    pub endpoint: Endpoint,
    /// Handshake courtesy sent after `Opened`.
    pub liveness_probe: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::parse(DEFAULT_ENDPOINT)
                .unwrap_or_else(|e| unreachable!("default endpoint is valid: {e}")),
            liveness_probe: DEFAULT_LIVENESS_PROBE.to_string(),
        }
    }
}

impl ClientConfig {
    /// Create a config for `endpoint` with the default probe.
    #[must_use]
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            ..Self::default()
        }
    }

    /// Load from `RELAY_CHAT_ENDPOINT` and `RELAY_CHAT_PROBE`, falling back
    /// to defaults for unset variables.
    ///
    /// # Errors
    /// Returns error if a set variable holds an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    ///
    /// # Errors
    /// Returns error if a present value is invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENDPOINT_VAR) {
            config.endpoint = Endpoint::parse(&raw)?;
        }
        if let Some(probe) = lookup(PROBE_VAR) {
            if probe.is_empty() {
                return Err(ConfigError::EmptyProbe);
            }
            config.liveness_probe = probe;
        }

        tracing::debug!(endpoint = %config.endpoint, "loaded client config");
        Ok(config)
    }
}
