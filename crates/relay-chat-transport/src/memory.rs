//! In-memory scripted transport.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use relay_chat_core::{
    ChannelEvent, ChannelHandle, ChannelState, Endpoint, EventListener, SendError,
    SessionIdentity, Transport,
};

use crate::channel::ChannelShared;

/// Record of one `open()` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenRecord {
    pub handle: ChannelHandle,
    pub endpoint: Endpoint,
    pub identity: SessionIdentity,
}

#[derive(Default)]
struct Inner {
    next_handle: u64,
    channels: HashMap<ChannelHandle, Arc<ChannelShared>>,
    opens: Vec<OpenRecord>,
    sent: Vec<(ChannelHandle, String)>,
    closed: Vec<ChannelHandle>,
}

/// In-memory transport driven by the caller.
///
/// Nothing touches the network: the driver decides when a channel opens,
/// what the peer says and when it goes away, via [`MemoryTransport::emit`].
/// Clones share state, so a test keeps one clone while the session
/// controller owns another.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryTransport {
    /// Create a new in-memory transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Surface `event` on `handle` as if the peer produced it.
    ///
    /// Returns false if the handle is unknown or was closed.
    pub fn emit(&self, handle: ChannelHandle, event: ChannelEvent) -> bool {
        let shared = self.lock().channels.get(&handle).cloned();
        shared.is_some_and(|shared| shared.emit(event))
    }

    /// Every `open()` call so far, oldest first.
    #[must_use]
    pub fn opens(&self) -> Vec<OpenRecord> {
        self.lock().opens.clone()
    }

    /// Handle returned by the most recent `open()`.
    #[must_use]
    pub fn last_handle(&self) -> Option<ChannelHandle> {
        self.lock().opens.last().map(|o| o.handle)
    }

    /// Every accepted payload, with the handle it was sent on.
    #[must_use]
    pub fn sent(&self) -> Vec<(ChannelHandle, String)> {
        self.lock().sent.clone()
    }

    /// Payloads accepted on one handle.
    #[must_use]
    pub fn sent_on(&self, handle: ChannelHandle) -> Vec<String> {
        self.lock()
            .sent
            .iter()
            .filter(|(h, _)| *h == handle)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    /// Handles passed to `close()` while still known, in order.
    #[must_use]
    pub fn closed(&self) -> Vec<ChannelHandle> {
        self.lock().closed.clone()
    }
}

impl Transport for MemoryTransport {
    fn open(
        &mut self,
        endpoint: &Endpoint,
        identity: &SessionIdentity,
        listener: EventListener,
    ) -> ChannelHandle {
        let mut inner = self.lock();
        inner.next_handle += 1;
        let handle = ChannelHandle(inner.next_handle);

        tracing::debug!(%handle, url = %endpoint.session_url(identity), "opening in-memory channel");
        inner
            .channels
            .insert(handle, ChannelShared::new(handle, listener));
        inner.opens.push(OpenRecord {
            handle,
            endpoint: endpoint.clone(),
            identity: identity.clone(),
        });
        handle
    }

    fn send(&mut self, handle: ChannelHandle, payload: &str) -> Result<(), SendError> {
        let mut inner = self.lock();
        let open = inner
            .channels
            .get(&handle)
            .is_some_and(|shared| shared.state().is_open());
        if !open {
            return Err(SendError::NotOpen(handle));
        }
        inner.sent.push((handle, payload.to_string()));
        Ok(())
    }

    fn close(&mut self, handle: ChannelHandle) {
        let mut inner = self.lock();
        if let Some(shared) = inner.channels.remove(&handle) {
            shared.detach();
            inner.closed.push(handle);
        }
    }

    fn state(&self, handle: ChannelHandle) -> ChannelState {
        self.lock()
            .channels
            .get(&handle)
            .map_or(ChannelState::Closed, |shared| shared.state())
    }
}
