//! State and listener shared between a channel's owner and its driver.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use relay_chat_core::{ChannelEvent, ChannelHandle, ChannelState, EventListener, TransportEvent};

struct Inner {
    state: ChannelState,
    listener: Option<EventListener>,
}

/// One channel's state machine plus its registered listener.
///
/// Emission and detaching take the same lock, so once `detach` returns no
/// event for this handle can reach the listener.
pub(crate) struct ChannelShared {
    handle: ChannelHandle,
    inner: Mutex<Inner>,
}

impl ChannelShared {
    pub(crate) fn new(handle: ChannelHandle, listener: EventListener) -> Arc<Self> {
        Arc::new(Self {
            handle,
            inner: Mutex::new(Inner {
                state: ChannelState::Connecting,
                listener: Some(listener),
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) const fn handle(&self) -> ChannelHandle {
        self.handle
    }

    pub(crate) fn state(&self) -> ChannelState {
        self.lock().state.clone()
    }

    /// Advance the state machine and deliver `event` to the listener.
    ///
    /// Returns false if the channel was detached or the listener is gone,
    /// in which case the event is dropped and the state is left untouched.
    pub(crate) fn emit(&self, event: ChannelEvent) -> bool {
        let mut inner = self.lock();
        let Some(listener) = inner.listener.as_ref() else {
            tracing::trace!(handle = %self.handle, ?event, "dropping event for detached channel");
            return false;
        };

        let next = inner.state.on_event(&event);
        if listener
            .send(TransportEvent::new(self.handle, event))
            .is_err()
        {
            inner.listener = None;
            return false;
        }
        if next != inner.state {
            tracing::debug!(handle = %self.handle, from = ?inner.state, to = ?next, "channel state changed");
            inner.state = next;
        }
        true
    }

    /// Force the channel to `Closed` and drop its listener.
    ///
    /// Returns the state the channel was in before detaching.
    pub(crate) fn detach(&self) -> ChannelState {
        let mut inner = self.lock();
        inner.listener = None;
        std::mem::replace(&mut inner.state, ChannelState::Closed)
    }
}
