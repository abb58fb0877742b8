//! Connection health signal for the UI layer.

use std::fmt;

use relay_chat_core::ChannelState;
use serde::Serialize;

/// Summary of the current channel's state, recomputed on every event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConnectionHealth {
    /// `start` has not been called yet.
    Idle,
    /// Waiting for the handshake. May last forever; there is no timeout.
    Connecting,
    /// The channel is open and accepts user messages.
    Connected,
    /// Closed or failed; waiting for a manual reconnect.
    Disconnected {
        /// Last transport error, if the channel failed rather than closed.
        reason: Option<String>,
    },
}

impl ConnectionHealth {
    #[must_use]
    pub fn from_state(state: &ChannelState) -> Self {
        match state {
            ChannelState::Connecting => Self::Connecting,
            ChannelState::Open => Self::Connected,
            ChannelState::Closed => Self::Disconnected { reason: None },
            ChannelState::Failed(reason) => Self::Disconnected {
                reason: Some(reason.clone()),
            },
        }
    }

    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("Not started"),
            Self::Connecting => f.write_str("Connecting to server..."),
            Self::Connected => f.write_str("Connected"),
            Self::Disconnected { reason: None } => f.write_str("Disconnected"),
            Self::Disconnected {
                reason: Some(reason),
            } => write!(f, "Disconnected: {reason}"),
        }
    }
}
