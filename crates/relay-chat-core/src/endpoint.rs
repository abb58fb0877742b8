//! Remote endpoint addressing.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::SessionIdentity;

/// Endpoint parse error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointError {
    #[error("Unsupported scheme in {0:?}: expected ws:// or wss://")]
    UnsupportedScheme(String),
    #[error("Missing host in {0:?}")]
    MissingHost(String),
}

/// Base address of the conversational backend, e.g. `ws://host:8000/test/ws-chatbot`.
///
/// The session identity is appended as the final path segment when a
/// channel is opened.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Endpoint(String);

impl Endpoint {
    /// Parse and validate an endpoint base.
    ///
    /// # Errors
    /// Returns error if the scheme is not `ws`/`wss` or the host is empty.
    pub fn parse(raw: &str) -> Result<Self, EndpointError> {
        let raw = raw.trim();
        let rest = raw
            .strip_prefix("ws://")
            .or_else(|| raw.strip_prefix("wss://"))
            .ok_or_else(|| EndpointError::UnsupportedScheme(raw.to_string()))?;

        let host = rest.split('/').next().unwrap_or_default();
        if host.is_empty() {
            return Err(EndpointError::MissingHost(raw.to_string()));
        }

        Ok(Self(raw.trim_end_matches('/').to_string()))
    }

    /// Full URL of the channel for one conversation.
    #[must_use]
    pub fn session_url(&self, identity: &SessionIdentity) -> String {
        format!("{}/{identity}", self.0)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Endpoint {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Endpoint {
    type Error = EndpointError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Endpoint> for String {
    fn from(value: Endpoint) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_url_appends_identity() {
        let endpoint = Endpoint::parse("ws://192.168.43.115:8000/test/ws-chatbot/").unwrap();
        let url = endpoint.session_url(&SessionIdentity::new("abc123"));
        assert_eq!(url, "ws://192.168.43.115:8000/test/ws-chatbot/abc123");
    }

    #[test]
    fn test_secure_scheme_accepted() {
        let endpoint: Endpoint = "wss://chat.example.com/ws".parse().unwrap();
        assert_eq!(endpoint.as_str(), "wss://chat.example.com/ws");
    }

    #[test]
    fn test_rejects_http_and_empty_host() {
        assert!(matches!(
            Endpoint::parse("http://example.com/ws"),
            Err(EndpointError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            Endpoint::parse("ws:///path"),
            Err(EndpointError::MissingHost(_))
        ));
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Endpoint = serde_json::from_str("\"ws://host/x\"").unwrap();
        assert_eq!(ok.to_string(), "ws://host/x");
        assert!(serde_json::from_str::<Endpoint>("\"ftp://host\"").is_err());
    }
}
