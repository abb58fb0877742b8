//! Transcript messages.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a message, unique within one `MessageLog`.
///
/// Always synthesized locally; inbound frames carry no id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    /// Typed by the local user.
    User,
    /// Delivered by the remote peer.
    Remote,
}

/// A single transcript entry. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    id: MessageId,
    text: String,
    sender: Sender,
}

impl Message {
    pub(crate) const fn new(id: MessageId, text: String, sender: Sender) -> Self {
        Self { id, text, sender }
    }

    #[must_use]
    pub const fn id(&self) -> MessageId {
        self.id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub const fn sender(&self) -> Sender {
        self.sender
    }

    /// Approximate heap size, used for logging.
    #[must_use]
    pub fn approx_bytes(&self) -> usize {
        std::mem::size_of::<Self>() + self.text.len()
    }
}
