//! Frame codec for the chat socket.
//!
//! Both directions carry raw text. There is no envelope: an inbound frame
//! is display text as a whole, never parsed for an id or other fields.

use tokio_tungstenite::tungstenite::Message;

/// What an inbound frame means to a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Display text from the peer.
    Text(String),
    /// The peer started the closing handshake.
    Close,
    /// Ping/pong and raw frames, answered by the socket library.
    Control,
}

/// Classify an inbound frame.
///
/// Binary frames are accepted as text, lossily decoded, so there is no
/// malformed-payload case.
#[must_use]
pub fn decode_inbound(frame: Message) -> Inbound {
    match frame {
        Message::Text(text) => Inbound::Text(text.as_str().to_owned()),
        Message::Binary(data) => Inbound::Text(String::from_utf8_lossy(&data).into_owned()),
        Message::Close(_) => Inbound::Close,
        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => Inbound::Control,
    }
}

/// Wrap an outbound payload as a text frame.
#[must_use]
pub fn encode_outbound(payload: String) -> Message {
    Message::text(payload)
}
