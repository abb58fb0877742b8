//! Core abstractions for a realtime chat session client.
//!
//! This crate provides the fundamental building blocks:
//! - `SessionIdentity` - Stable conversation identifier for one process run
//! - `Endpoint` - Validated `ws(s)://` base address
//! - `Message` - Immutable transcript entry
//! - `MessageLog` - Append-only history + broadcast for observers
//! - `Transport` trait, channel events and `ChannelState`

pub mod endpoint;
pub mod identity;
pub mod message;
pub mod msg_log;
pub mod traits;

pub use endpoint::{Endpoint, EndpointError};
pub use identity::SessionIdentity;
pub use message::{Message, MessageId, Sender};
pub use msg_log::MessageLog;
pub use traits::{
    ChannelEvent, ChannelHandle, ChannelState, EventListener, SendError, Transport,
    TransportEvent,
};
