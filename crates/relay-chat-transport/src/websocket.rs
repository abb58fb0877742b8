//! WebSocket transport for the chat backend.

use std::{collections::HashMap, sync::Arc};

use futures::{SinkExt, StreamExt};
use relay_chat_core::{
    ChannelEvent, ChannelHandle, ChannelState, Endpoint, EventListener, SendError,
    SessionIdentity, Transport,
};
use tokio::{runtime::Handle, sync::mpsc, task::JoinHandle};

use crate::{
    channel::ChannelShared,
    protocol::{self, Inbound},
};

/// One live socket owned by the transport.
struct WsChannel {
    shared: Arc<ChannelShared>,
    outbound: mpsc::UnboundedSender<String>,
    task: Option<JoinHandle<()>>,
}

/// WebSocket transport.
///
/// Every `open()` spawns one I/O task on the current tokio runtime; the
/// task owns the socket and reports through the channel's listener. Opening
/// outside a runtime fails the channel with an `Error` event instead of
/// panicking.
pub struct WsTransport {
    next_handle: u64,
    channels: HashMap<ChannelHandle, WsChannel>,
}

impl WsTransport {
    /// Create a new WebSocket transport.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_handle: 1,
            channels: HashMap::new(),
        }
    }
}

impl Default for WsTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for WsTransport {
    fn open(
        &mut self,
        endpoint: &Endpoint,
        identity: &SessionIdentity,
        listener: EventListener,
    ) -> ChannelHandle {
        let handle = ChannelHandle(self.next_handle);
        self.next_handle += 1;

        let url = endpoint.session_url(identity);
        tracing::info!(%handle, %url, "opening channel");

        let shared = ChannelShared::new(handle, listener);
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let task = match Handle::try_current() {
            Ok(runtime) => Some(runtime.spawn(run_channel(
                url,
                Arc::clone(&shared),
                outbound_rx,
            ))),
            Err(e) => {
                tracing::error!(%handle, "cannot open channel: {e}");
                shared.emit(ChannelEvent::Error(format!("no async runtime: {e}")));
                None
            }
        };

        self.channels.insert(
            handle,
            WsChannel {
                shared,
                outbound,
                task,
            },
        );
        handle
    }

    fn send(&mut self, handle: ChannelHandle, payload: &str) -> Result<(), SendError> {
        let channel = self
            .channels
            .get(&handle)
            .ok_or(SendError::NotOpen(handle))?;

        if !channel.shared.state().is_open() {
            return Err(SendError::NotOpen(handle));
        }

        channel
            .outbound
            .send(payload.to_string())
            .map_err(|_| SendError::NotOpen(handle))
    }

    fn close(&mut self, handle: ChannelHandle) {
        let Some(channel) = self.channels.remove(&handle) else {
            return;
        };

        let previous = channel.shared.detach();
        tracing::info!(%handle, ?previous, "closing channel");

        if let (ChannelState::Connecting, Some(task)) = (previous, channel.task) {
            // Nothing to flush; an unresolved handshake would otherwise linger.
            task.abort();
        }
        // Dropping `outbound` lets an open socket send its close frame.
    }

    fn state(&self, handle: ChannelHandle) -> ChannelState {
        self.channels
            .get(&handle)
            .map_or(ChannelState::Closed, |c| c.shared.state())
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        let handles: Vec<_> = self.channels.keys().copied().collect();
        for handle in handles {
            self.close(handle);
        }
    }
}

async fn run_channel(
    url: String,
    shared: Arc<ChannelShared>,
    mut outbound: mpsc::UnboundedReceiver<String>,
) {
    let handle = shared.handle();

    let stream = match tokio_tungstenite::connect_async(url.as_str()).await {
        Ok((stream, _response)) => stream,
        Err(e) => {
            tracing::warn!(%handle, "WebSocket handshake failed: {e}");
            shared.emit(ChannelEvent::Error(format!("handshake failed: {e}")));
            return;
        }
    };

    if !shared.emit(ChannelEvent::Opened) {
        return;
    }
    tracing::debug!(%handle, "channel open");

    let (mut sink, mut reader) = stream.split();

    loop {
        tokio::select! {
            frame = reader.next() => match frame {
                Some(Ok(frame)) => match protocol::decode_inbound(frame) {
                    Inbound::Text(text) => {
                        if !shared.emit(ChannelEvent::MessageReceived(text)) {
                            break;
                        }
                    }
                    Inbound::Close => {
                        tracing::info!(%handle, "peer closed channel");
                        shared.emit(ChannelEvent::Closed);
                        break;
                    }
                    Inbound::Control => {}
                },
                Some(Err(e)) => {
                    tracing::error!(%handle, "WebSocket error: {e}");
                    shared.emit(ChannelEvent::Error(e.to_string()));
                    break;
                }
                None => {
                    shared.emit(ChannelEvent::Closed);
                    break;
                }
            },
            payload = outbound.recv() => match payload {
                Some(text) => {
                    if let Err(e) = sink.send(protocol::encode_outbound(text)).await {
                        tracing::error!(%handle, "WebSocket send failed: {e}");
                        shared.emit(ChannelEvent::Error(e.to_string()));
                        break;
                    }
                }
                None => {
                    // Closed locally; the listener is already detached.
                    let _ = sink.close().await;
                    break;
                }
            },
        }
    }

    tracing::debug!(%handle, "channel task finished");
}
