//! Transport channels for the realtime chat session client.
//!
//! Provides:
//! - Frame codec for raw text payloads (feature: websocket)
//! - WebSocket transport (feature: websocket)
//! - Scripted in-memory transport (feature: memory)

mod channel;

#[cfg(feature = "websocket")]
pub mod protocol;

#[cfg(feature = "websocket")]
pub mod websocket;

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "websocket")]
pub use websocket::WsTransport;

#[cfg(feature = "memory")]
pub use memory::{MemoryTransport, OpenRecord};
