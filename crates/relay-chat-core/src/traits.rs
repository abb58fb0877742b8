//! Transport contract shared by every channel implementation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::{Endpoint, SessionIdentity};

/// Identifier of one connection attempt.
///
/// Allocated per `open()` and never reused by the same transport, so an
/// event can always be attributed to the generation of socket it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChannelHandle(pub u64);

impl fmt::Display for ChannelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum ChannelState {
    /// Handshake in flight.
    Connecting,
    /// Handshake completed; sends are accepted.
    Open,
    /// Closed locally or by the peer. Terminal.
    Closed,
    /// Handshake or transport error. Terminal.
    Failed(String),
}

impl ChannelState {
    /// Whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Failed(_))
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Compute the state after `event`.
    ///
    /// Terminal states absorb every event. A close that arrives before the
    /// handshake completed counts as a handshake failure.
    #[must_use]
    pub fn on_event(&self, event: &ChannelEvent) -> Self {
        match (self, event) {
            (Self::Connecting, ChannelEvent::Opened) => Self::Open,
            (Self::Connecting, ChannelEvent::Closed) => {
                Self::Failed("connection closed during handshake".to_string())
            }
            (Self::Connecting | Self::Open, ChannelEvent::Error(reason)) => {
                Self::Failed(reason.clone())
            }
            (Self::Open, ChannelEvent::Closed) => Self::Closed,
            (state, _) => state.clone(),
        }
    }
}

/// Event surfaced by a channel, in transport order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Handshake completed.
    Opened,
    /// A text frame from the peer, verbatim.
    MessageReceived(String),
    /// The connection closed.
    Closed,
    /// Handshake or transport error description.
    Error(String),
}

/// A channel event tagged with the handle that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportEvent {
    pub handle: ChannelHandle,
    pub event: ChannelEvent,
}

impl TransportEvent {
    #[must_use]
    pub const fn new(handle: ChannelHandle, event: ChannelEvent) -> Self {
        Self { handle, event }
    }
}

/// The single subscriber registered with a channel.
pub type EventListener = mpsc::UnboundedSender<TransportEvent>;

/// Send error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("Channel {0} is not open")]
    NotOpen(ChannelHandle),
}

/// Persistent-connection abstraction to the remote endpoint.
///
/// All methods are non-blocking. `open` only starts a connection attempt;
/// its outcome arrives later as `Opened` or `Error` on the listener.
pub trait Transport: Send {
    /// Start a connection attempt to `endpoint` scoped by `identity`.
    ///
    /// The new channel starts in `Connecting` and reports its events to
    /// `listener` only.
    fn open(
        &mut self,
        endpoint: &Endpoint,
        identity: &SessionIdentity,
        listener: EventListener,
    ) -> ChannelHandle;

    /// Enqueue a text payload. Fire-and-forget.
    ///
    /// # Errors
    /// Returns `SendError::NotOpen` unless the channel is `Open`.
    fn send(&mut self, handle: ChannelHandle, payload: &str) -> Result<(), SendError>;

    /// Close and discard a channel.
    ///
    /// Idempotent and safe from any state. Once this returns, the listener
    /// receives no further events for `handle`.
    fn close(&mut self, handle: ChannelHandle);

    /// Current state of a channel. Unknown or discarded handles are `Closed`.
    fn state(&self, handle: ChannelHandle) -> ChannelState;
}
