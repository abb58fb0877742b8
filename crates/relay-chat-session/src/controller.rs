//! Session controller: the only owner of a live channel handle.

use relay_chat_core::{
    ChannelEvent, ChannelHandle, Endpoint, EventListener, Message, MessageId, MessageLog,
    SendError, SessionIdentity, Transport, TransportEvent,
};
use tokio::sync::{broadcast, mpsc, watch};

use crate::{ClientConfig, ConnectionHealth, config::DEFAULT_LIVENESS_PROBE};

/// Session controller error.
///
/// Every variant is an advisory for the UI; none is fatal.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Not connected to server")]
    NotConnected,
    #[error("Message is empty")]
    EmptyText,
    #[error("Session not started")]
    NotStarted,
    #[error("Message {id} was logged but not transmitted: {source}")]
    NotTransmitted { id: MessageId, source: SendError },
}

/// Orchestrates one conversation over successive transport channels.
///
/// Driven from a single task: UI calls and transport events all go through
/// `&mut self`, so the log and the current handle need no locking. Channel
/// events are queued by the transport and applied by
/// [`process_next`](Self::process_next) or
/// [`process_pending`](Self::process_pending).
pub struct SessionController<T>
where
    T: Transport,
{
    transport: T,
    identity: SessionIdentity,
    liveness_probe: String,
    endpoint: Option<Endpoint>,
    current: Option<ChannelHandle>,
    log: MessageLog,
    health: watch::Sender<ConnectionHealth>,
    listener: EventListener,
    events: mpsc::UnboundedReceiver<TransportEvent>,
}

impl<T> SessionController<T>
where
    T: Transport,
{
    /// Create a controller with a freshly generated session identity.
    #[must_use]
    pub fn new(transport: T) -> Self {
        Self::with_identity(transport, SessionIdentity::generate())
    }

    /// Create a controller with an injected session identity.
    #[must_use]
    pub fn with_identity(transport: T, identity: SessionIdentity) -> Self {
        let (listener, events) = mpsc::unbounded_channel();
        let (health, _) = watch::channel(ConnectionHealth::Idle);
        tracing::debug!(%identity, "session controller created");

        Self {
            transport,
            identity,
            liveness_probe: DEFAULT_LIVENESS_PROBE.to_string(),
            endpoint: None,
            current: None,
            log: MessageLog::new(),
            health,
            listener,
            events,
        }
    }

    /// Create a controller using the probe from `config`.
    ///
    /// The endpoint is still passed to [`start`](Self::start) explicitly.
    #[must_use]
    pub fn from_config(transport: T, config: &ClientConfig) -> Self {
        Self::new(transport).with_liveness_probe(config.liveness_probe.clone())
    }

    /// Replace the text sent right after a channel opens.
    #[must_use]
    pub fn with_liveness_probe(mut self, probe: impl Into<String>) -> Self {
        self.liveness_probe = probe.into();
        self
    }

    /// The identity used for every channel this controller opens.
    #[must_use]
    pub const fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    /// Handle of the channel currently owned, if any.
    #[must_use]
    pub const fn current_handle(&self) -> Option<ChannelHandle> {
        self.current
    }

    /// Open a channel to `endpoint`.
    ///
    /// Non-blocking: the outcome arrives later as a transport event. A
    /// channel still owned from an earlier start is discarded first.
    pub fn start(&mut self, endpoint: Endpoint) -> ChannelHandle {
        self.discard_current();

        let handle = self
            .transport
            .open(&endpoint, &self.identity, self.listener.clone());
        tracing::info!(%handle, %endpoint, identity = %self.identity, "session starting");

        self.endpoint = Some(endpoint);
        self.current = Some(handle);
        self.refresh_health();
        handle
    }

    /// Close the current channel and open a new one with the same identity.
    ///
    /// The message log is left untouched.
    ///
    /// # Errors
    /// Returns `SessionError::NotStarted` if `start` was never called.
    pub fn reconnect(&mut self) -> Result<ChannelHandle, SessionError> {
        let endpoint = self.endpoint.clone().ok_or(SessionError::NotStarted)?;
        tracing::info!(previous = ?self.current, "reconnecting");
        Ok(self.start(endpoint))
    }

    /// Close the current channel without opening another.
    pub fn shutdown(&mut self) {
        if self.current.is_some() {
            tracing::info!(identity = %self.identity, "session shutting down");
        }
        self.discard_current();
        self.refresh_health();
    }

    /// Log and transmit a user message.
    ///
    /// The message is appended before it is handed to the transport, so it
    /// stays visible even if transmission fails.
    ///
    /// # Errors
    /// - `EmptyText` for empty or whitespace-only input
    /// - `NotConnected` unless the session is connected; nothing is logged
    /// - `NotTransmitted` if the transport refused the logged message
    pub fn send_user_text(&mut self, text: &str) -> Result<MessageId, SessionError> {
        if text.trim().is_empty() {
            return Err(SessionError::EmptyText);
        }

        let handle = match self.current {
            Some(handle) if self.health.borrow().is_connected() => handle,
            _ => {
                let health = self.connection_health();
                tracing::warn!(%health, "dropping message: not connected");
                return Err(SessionError::NotConnected);
            }
        };

        let id = self.log.push_user(text).id();
        self.transport
            .send(handle, text)
            .map_err(|source| {
                tracing::warn!(%id, %handle, "message not transmitted: {source}");
                SessionError::NotTransmitted { id, source }
            })?;
        Ok(id)
    }

    /// Apply one transport event.
    ///
    /// Events from any handle other than the current one are ignored.
    pub fn on_transport_event(&mut self, event: TransportEvent) {
        let TransportEvent { handle, event } = event;
        if self.current != Some(handle) {
            tracing::debug!(%handle, current = ?self.current, ?event, "ignoring stale event");
            return;
        }

        match event {
            ChannelEvent::Opened => {
                tracing::info!(%handle, "session connected");
                if let Err(e) = self.transport.send(handle, &self.liveness_probe) {
                    tracing::warn!(%handle, "liveness probe not sent: {e}");
                }
            }
            ChannelEvent::MessageReceived(raw) => {
                self.log.push_remote(raw);
            }
            ChannelEvent::Closed => {
                tracing::info!(%handle, "session disconnected");
            }
            ChannelEvent::Error(reason) => {
                tracing::warn!(%handle, %reason, "session failed");
            }
        }

        self.refresh_health();
    }

    /// Wait for the next transport event and apply it.
    ///
    /// Cancel safe: an event is either fully applied or left queued.
    pub async fn process_next(&mut self) {
        if let Some(event) = self.events.recv().await {
            self.on_transport_event(event);
        }
    }

    /// Apply every queued transport event without waiting.
    ///
    /// Returns how many events were taken off the queue, stale ones included.
    pub fn process_pending(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(event) = self.events.try_recv() {
            self.on_transport_event(event);
            processed += 1;
        }
        processed
    }

    /// Snapshot of the conversation, in order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Message> {
        self.log.snapshot()
    }

    #[must_use]
    pub const fn log(&self) -> &MessageLog {
        &self.log
    }

    /// Receiver for messages appended from now on.
    #[must_use]
    pub fn subscribe_messages(&self) -> broadcast::Receiver<Message> {
        self.log.subscribe()
    }

    #[must_use]
    pub fn connection_health(&self) -> ConnectionHealth {
        self.health.borrow().clone()
    }

    /// Receiver that observes every health change.
    #[must_use]
    pub fn subscribe_health(&self) -> watch::Receiver<ConnectionHealth> {
        self.health.subscribe()
    }

    /// Close and forget the current handle. Its queued events become stale.
    fn discard_current(&mut self) {
        if let Some(handle) = self.current.take() {
            self.transport.close(handle);
        }
    }

    fn refresh_health(&self) {
        let next = match (self.current, &self.endpoint) {
            (Some(handle), _) => ConnectionHealth::from_state(&self.transport.state(handle)),
            (None, None) => ConnectionHealth::Idle,
            (None, Some(_)) => ConnectionHealth::Disconnected { reason: None },
        };

        self.health.send_if_modified(|health| {
            if *health == next {
                return false;
            }
            tracing::debug!(from = %health, to = %next, "connection health changed");
            *health = next;
            true
        });
    }
}

impl<T> Drop for SessionController<T>
where
    T: Transport,
{
    fn drop(&mut self) {
        self.discard_current();
    }
}

#[cfg(test)]
mod tests {
    use relay_chat_core::{ChannelState, Sender};
    use relay_chat_transport::MemoryTransport;

    use super::*;

    fn endpoint() -> Endpoint {
        Endpoint::parse("ws://host/x").unwrap()
    }

    /// A started controller plus a driver clone of its transport.
    fn started() -> (SessionController<MemoryTransport>, MemoryTransport, ChannelHandle) {
        let transport = MemoryTransport::new();
        let driver = transport.clone();
        let mut controller =
            SessionController::with_identity(transport, SessionIdentity::new("thread-1"));
        let handle = controller.start(endpoint());
        (controller, driver, handle)
    }

    fn connected() -> (SessionController<MemoryTransport>, MemoryTransport, ChannelHandle) {
        let (mut controller, driver, handle) = started();
        assert!(driver.emit(handle, ChannelEvent::Opened));
        controller.process_pending();
        (controller, driver, handle)
    }

    fn texts(controller: &SessionController<MemoryTransport>) -> Vec<(Sender, String)> {
        controller
            .snapshot()
            .iter()
            .map(|m| (m.sender(), m.text().to_string()))
            .collect()
    }

    #[test]
    fn test_start_opens_with_identity_and_probes_without_logging() {
        let (mut controller, driver, handle) = started();
        assert_eq!(controller.connection_health(), ConnectionHealth::Connecting);

        let opens = driver.opens();
        assert_eq!(opens.len(), 1);
        assert_eq!(opens[0].endpoint, endpoint());
        assert_eq!(opens[0].identity, SessionIdentity::new("thread-1"));

        driver.emit(handle, ChannelEvent::Opened);
        assert_eq!(controller.process_pending(), 1);

        assert_eq!(driver.sent_on(handle), vec!["hi".to_string()]);
        assert!(controller.log().is_empty());
        assert_eq!(controller.connection_health(), ConnectionHealth::Connected);
    }

    #[test]
    fn test_custom_probe() {
        let transport = MemoryTransport::new();
        let driver = transport.clone();
        let config = ClientConfig {
            liveness_probe: "ping".to_string(),
            ..ClientConfig::new(endpoint())
        };
        let mut controller = SessionController::from_config(transport, &config);
        let handle = controller.start(config.endpoint.clone());
        driver.emit(handle, ChannelEvent::Opened);
        controller.process_pending();

        assert_eq!(driver.sent_on(handle), vec!["ping".to_string()]);
    }

    #[test]
    fn test_send_user_text_logs_once_and_sends_once() {
        let (mut controller, driver, handle) = connected();

        let id = tokio_test::assert_ok!(controller.send_user_text("hello"));

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id(), id);
        assert_eq!(snapshot[0].text(), "hello");
        assert_eq!(snapshot[0].sender(), Sender::User);
        assert_eq!(
            driver.sent_on(handle),
            vec!["hi".to_string(), "hello".to_string()]
        );
    }

    #[test]
    fn test_blank_text_never_logs_or_sends() {
        let (mut controller, driver, handle) = connected();

        for text in ["", "   ", "\n\t"] {
            assert!(matches!(
                controller.send_user_text(text),
                Err(SessionError::EmptyText)
            ));
        }
        assert!(controller.log().is_empty());
        assert_eq!(driver.sent_on(handle), vec!["hi".to_string()]);
    }

    #[test]
    fn test_user_and_remote_entries_interleave_in_order() {
        let (mut controller, driver, handle) = connected();

        controller.send_user_text("one").unwrap();
        driver.emit(handle, ChannelEvent::MessageReceived("r1".into()));
        driver.emit(handle, ChannelEvent::MessageReceived("r2".into()));
        controller.process_pending();
        controller.send_user_text("two").unwrap();
        driver.emit(handle, ChannelEvent::MessageReceived("r3".into()));
        controller.process_pending();

        assert_eq!(
            texts(&controller),
            vec![
                (Sender::User, "one".to_string()),
                (Sender::Remote, "r1".to_string()),
                (Sender::Remote, "r2".to_string()),
                (Sender::User, "two".to_string()),
                (Sender::Remote, "r3".to_string()),
            ]
        );
    }

    #[test]
    fn test_remote_message_gets_fresh_id_and_raw_text() {
        let (mut controller, driver, handle) = connected();
        controller.send_user_text("hello").unwrap();

        let raw = r#"{"id":"1","text":"hi there"}"#;
        driver.emit(handle, ChannelEvent::MessageReceived("hi there".into()));
        driver.emit(handle, ChannelEvent::MessageReceived(raw.into()));
        controller.process_pending();

        let snapshot = controller.snapshot();
        assert_eq!(snapshot[1].text(), "hi there");
        assert_eq!(snapshot[1].sender(), Sender::Remote);
        assert_eq!(snapshot[2].text(), raw);
        assert_ne!(snapshot[0].id(), snapshot[1].id());
        assert_ne!(snapshot[1].id(), snapshot[2].id());
    }

    #[test]
    fn test_send_while_closed_is_rejected() {
        let (mut controller, driver, handle) = connected();
        driver.emit(handle, ChannelEvent::Closed);
        controller.process_pending();

        assert_eq!(
            controller.connection_health(),
            ConnectionHealth::Disconnected { reason: None }
        );
        assert!(matches!(
            controller.send_user_text("hello"),
            Err(SessionError::NotConnected)
        ));
        assert!(controller.log().is_empty());
        assert_eq!(driver.sent_on(handle), vec!["hi".to_string()]);
    }

    #[test]
    fn test_send_while_connecting_is_rejected() {
        let (mut controller, driver, _) = started();
        assert!(matches!(
            controller.send_user_text("hello"),
            Err(SessionError::NotConnected)
        ));
        assert!(controller.log().is_empty());
        assert!(driver.sent().is_empty());
    }

    #[test]
    fn test_refused_send_keeps_logged_message() {
        let (mut controller, driver, handle) = connected();
        // Closed on the transport, not yet applied by the controller.
        driver.emit(handle, ChannelEvent::Closed);

        let (id, source) = match controller.send_user_text("hello") {
            Err(SessionError::NotTransmitted { id, source }) => (id, source),
            other => panic!("expected NotTransmitted, got {other:?}"),
        };
        assert_eq!(source, SendError::NotOpen(handle));
        assert_eq!(controller.snapshot()[0].id(), id);
        assert_eq!(driver.sent_on(handle), vec!["hi".to_string()]);
    }

    #[test]
    fn test_handshake_failure_does_not_retry() {
        let (mut controller, driver, handle) = started();
        driver.emit(handle, ChannelEvent::Error("connection refused".into()));
        controller.process_pending();

        assert_eq!(
            controller.connection_health(),
            ConnectionHealth::Disconnected {
                reason: Some("connection refused".into())
            }
        );
        assert_eq!(driver.opens().len(), 1);
    }

    #[test]
    fn test_reconnect_keeps_log_and_identity() {
        let (mut controller, driver, old) = connected();
        controller.send_user_text("hello").unwrap();
        driver.emit(old, ChannelEvent::MessageReceived("hi there".into()));
        driver.emit(old, ChannelEvent::Closed);
        controller.process_pending();
        let before = controller.snapshot();

        let new = controller.reconnect().unwrap();

        assert_ne!(new, old);
        assert_eq!(controller.current_handle(), Some(new));
        assert_eq!(controller.snapshot(), before);
        assert_eq!(driver.closed(), vec![old]);
        let opens = driver.opens();
        assert_eq!(opens.len(), 2);
        assert_eq!(opens[0].identity, opens[1].identity);
        assert_eq!(opens[1].endpoint, endpoint());
        assert_eq!(controller.connection_health(), ConnectionHealth::Connecting);

        driver.emit(new, ChannelEvent::Opened);
        controller.process_pending();
        assert_eq!(driver.sent_on(new), vec!["hi".to_string()]);
        assert_eq!(controller.snapshot().len(), before.len());
    }

    #[test]
    fn test_stale_message_after_reconnect_is_ignored() {
        let (mut controller, driver, old) = connected();

        // Queued by the old socket but not yet applied when the user reconnects.
        assert!(driver.emit(old, ChannelEvent::MessageReceived("stale".into())));
        let new = controller.reconnect().unwrap();
        driver.emit(new, ChannelEvent::Opened);
        assert!(!driver.emit(old, ChannelEvent::MessageReceived("later".into())));

        assert_eq!(controller.process_pending(), 2);
        assert!(controller.log().is_empty());
        assert_eq!(controller.connection_health(), ConnectionHealth::Connected);
        assert_eq!(driver.state(old), ChannelState::Closed);
    }

    #[test]
    fn test_old_handle_events_after_new_open_are_ignored() {
        let (mut controller, driver, old) = connected();
        let new = controller.reconnect().unwrap();
        driver.emit(new, ChannelEvent::Opened);
        controller.process_pending();

        controller.on_transport_event(TransportEvent::new(
            old,
            ChannelEvent::MessageReceived("late".into()),
        ));
        controller.on_transport_event(TransportEvent::new(old, ChannelEvent::Closed));
        controller.on_transport_event(TransportEvent::new(
            old,
            ChannelEvent::Error("reset".into()),
        ));

        assert!(controller.log().is_empty());
        assert_eq!(controller.connection_health(), ConnectionHealth::Connected);
        assert_eq!(controller.current_handle(), Some(new));
        assert_eq!(driver.sent_on(new), vec!["hi".to_string()]);
    }

    #[test]
    fn test_stale_close_after_reconnect_keeps_health() {
        let (mut controller, driver, old) = connected();
        driver.emit(old, ChannelEvent::Error("reset".into()));
        let new = controller.reconnect().unwrap();
        driver.emit(new, ChannelEvent::Opened);
        controller.process_pending();

        assert_eq!(controller.connection_health(), ConnectionHealth::Connected);
        controller.send_user_text("still here").unwrap();
        assert_eq!(
            driver.sent_on(new),
            vec!["hi".to_string(), "still here".to_string()]
        );
    }

    #[test]
    fn test_reconnect_before_start() {
        let mut controller = SessionController::new(MemoryTransport::new());
        assert_eq!(controller.connection_health(), ConnectionHealth::Idle);
        assert!(matches!(
            controller.reconnect(),
            Err(SessionError::NotStarted)
        ));
    }

    #[test]
    fn test_health_subscription_sees_changes() {
        let (mut controller, driver, handle) = started();
        let mut health = controller.subscribe_health();
        assert_eq!(*health.borrow_and_update(), ConnectionHealth::Connecting);

        driver.emit(handle, ChannelEvent::Opened);
        controller.process_pending();
        assert!(health.has_changed().unwrap());
        assert_eq!(*health.borrow_and_update(), ConnectionHealth::Connected);

        // Message traffic leaves health alone.
        driver.emit(handle, ChannelEvent::MessageReceived("x".into()));
        controller.process_pending();
        assert!(!health.has_changed().unwrap());
    }

    #[test]
    fn test_message_subscription_sees_both_senders() {
        let (mut controller, driver, handle) = connected();
        let mut messages = controller.subscribe_messages();

        controller.send_user_text("q").unwrap();
        driver.emit(handle, ChannelEvent::MessageReceived("a".into()));
        controller.process_pending();

        assert_eq!(messages.try_recv().unwrap().sender(), Sender::User);
        assert_eq!(messages.try_recv().unwrap().sender(), Sender::Remote);
    }

    #[test]
    fn test_shutdown_and_drop_close_the_channel() {
        let (mut controller, driver, handle) = connected();
        controller.shutdown();
        assert_eq!(driver.closed(), vec![handle]);
        assert_eq!(
            controller.connection_health(),
            ConnectionHealth::Disconnected { reason: None }
        );

        let (controller, driver, handle) = connected();
        drop(controller);
        assert_eq!(driver.closed(), vec![handle]);
    }

    #[tokio::test]
    async fn test_process_next_applies_one_event() {
        let (mut controller, driver, handle) = connected();
        driver.emit(handle, ChannelEvent::MessageReceived("hi there".into()));

        controller.process_next().await;

        assert_eq!(
            texts(&controller),
            vec![(Sender::Remote, "hi there".to_string())]
        );
    }
}
