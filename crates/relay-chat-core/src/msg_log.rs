//! Append-only message log with broadcast for observers.

use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::{Message, MessageId, Sender};

/// Capacity of the live broadcast channel.
const LIVE_CAPACITY: usize = 1024;

/// Ordered, append-only record of the conversation.
///
/// Owned by exactly one session controller. Observers read snapshots or
/// subscribe to live appends; they never mutate the log. There is no
/// eviction: the log grows for the lifetime of its owner.
pub struct MessageLog {
    history: Vec<Message>,
    next_id: u64,
    total_bytes: usize,
    sender: broadcast::Sender<Message>,
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(LIVE_CAPACITY);
        Self {
            history: Vec::with_capacity(32),
            next_id: 1,
            total_bytes: 0,
            sender,
        }
    }

    /// Append a message, assigning it the next id.
    ///
    /// Never fails. Live subscribers that lag behind lose messages from
    /// their stream, never from the log itself.
    pub fn append(&mut self, sender: Sender, text: impl Into<String>) -> Message {
        let msg = Message::new(MessageId(self.next_id), text.into(), sender);
        self.next_id += 1;
        self.total_bytes = self.total_bytes.saturating_add(msg.approx_bytes());
        self.history.push(msg.clone());
        let _ = self.sender.send(msg.clone()); // live listeners

        tracing::trace!(
            id = %msg.id(),
            ?sender,
            entries = self.history.len(),
            total_bytes = self.total_bytes,
            "appended message"
        );
        msg
    }

    /// Append a message authored by the local user.
    pub fn push_user(&mut self, text: impl Into<String>) -> Message {
        self.append(Sender::User, text)
    }

    /// Append a message delivered by the remote peer.
    pub fn push_remote(&mut self, text: impl Into<String>) -> Message {
        self.append(Sender::Remote, text)
    }

    /// Get a snapshot of every message appended so far, in order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Message> {
        self.history.clone()
    }

    /// Borrow the history without cloning.
    #[must_use]
    pub fn as_slice(&self) -> &[Message] {
        &self.history
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.history.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Get a receiver for live appends.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.sender.subscribe()
    }

    /// Stream that yields history first, then live appends.
    ///
    /// Appends need `&mut self`, so the snapshot and the subscription are
    /// taken without any append in between.
    #[must_use]
    pub fn history_plus_stream(&self) -> futures::stream::BoxStream<'static, Message> {
        let (history, rx) = (self.snapshot(), self.subscribe());

        let hist = futures::stream::iter(history);
        let live = BroadcastStream::new(rx).filter_map(|res| async move {
            match res {
                Ok(msg) => Some(msg),
                Err(e) => {
                    tracing::warn!("message subscriber lagged: {e}");
                    None
                }
            }
        });

        Box::pin(hist.chain(live))
    }
}
