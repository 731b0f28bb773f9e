use crate::conversation::{ChatMessage, ConversationStore};
use crate::error::ClientError;
use crate::notice::NoticeSink;
use crate::protocol::{OutboundFrame, TransportEvent};
use crate::request::RequestTransport;
use crate::settings::{Settings, SettingsStore, TransportPreference};
use crate::transport::{ConnectionState, TransportManager};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::debug;

/// Chooses a transport per outgoing message and unifies results.
///
/// At most one exchange is in flight at a time; a second send while busy is
/// rejected, not queued. On the persistent channel the reply arrives through
/// the inbound event pump; the fallback round trip is awaited in place.
#[derive(Clone)]
pub struct MessageRouter {
    inner: Arc<RouterInner>,
}

struct RouterInner {
    transport: TransportManager,
    request: Arc<dyn RequestTransport>,
    settings: SettingsStore,
    conversation: ConversationStore,
    notices: NoticeSink,
    typing_tx: watch::Sender<bool>,
    busy: AtomicBool,
    // Set while a persistent-channel reply is outstanding; lets the pump
    // distinguish a mid-exchange connection loss from an idle one.
    awaiting_channel_reply: AtomicBool,
}

impl MessageRouter {
    pub fn new(
        transport: TransportManager,
        request: Arc<dyn RequestTransport>,
        settings: SettingsStore,
        conversation: ConversationStore,
        notices: NoticeSink,
    ) -> Self {
        let (typing_tx, _) = watch::channel(false);
        let events = transport.take_events();
        let inner = Arc::new(RouterInner {
            transport,
            request,
            settings,
            conversation,
            notices,
            typing_tx,
            busy: AtomicBool::new(false),
            awaiting_channel_reply: AtomicBool::new(false),
        });
        if let Some(events) = events {
            let pump_inner = inner.clone();
            tokio::spawn(async move {
                pump_inner.pump(events).await;
            });
        }
        Self { inner }
    }

    /// Route one outgoing message.
    ///
    /// Preference `persistent` with a connected channel sends over the
    /// socket; anything else (including a failed persistent send) falls back
    /// to exactly one request/response round trip.
    pub async fn send(&self, text: impl Into<String>) -> Result<(), ClientError> {
        let text = text.into();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(());
        }
        if self.inner.busy.swap(true, Ordering::SeqCst) {
            return Err(ClientError::Busy);
        }

        let settings = self.inner.settings.current();
        self.inner.conversation.append(ChatMessage::user(trimmed));

        if settings.transport_preference == TransportPreference::Persistent
            && self.inner.transport.state() == ConnectionState::Connected
        {
            let frame = OutboundFrame {
                message: trimmed,
                temperature: settings.temperature,
                max_length: settings.max_length,
            };
            self.inner
                .awaiting_channel_reply
                .store(true, Ordering::SeqCst);
            match self.inner.transport.send(&frame) {
                // Reply and typing updates arrive through the event pump.
                Ok(()) => return Ok(()),
                Err(ClientError::TransportUnavailable) => {
                    self.inner
                        .awaiting_channel_reply
                        .store(false, Ordering::SeqCst);
                    debug!("persistent send failed, using fallback");
                }
                Err(err) => {
                    self.inner
                        .awaiting_channel_reply
                        .store(false, Ordering::SeqCst);
                    self.inner.busy.store(false, Ordering::SeqCst);
                    self.inner.notices.error(err.user_message());
                    return Err(err);
                }
            }
        }

        self.fallback_round_trip(trimmed, &settings).await
    }

    async fn fallback_round_trip(
        &self,
        message: &str,
        settings: &Settings,
    ) -> Result<(), ClientError> {
        // Under the fallback there is no remote typing signal; the busy
        // bracket around the round trip doubles as one.
        self.inner.typing_tx.send_replace(true);
        let result = self.inner.request.chat(message, settings).await;
        self.inner.typing_tx.send_replace(false);
        self.inner.busy.store(false, Ordering::SeqCst);
        match result {
            Ok(reply) => {
                self.inner.conversation.append(ChatMessage::assistant(reply));
                Ok(())
            }
            Err(err) => {
                self.inner.notices.error(err.user_message());
                Err(err)
            }
        }
    }

    /// Persist new settings and apply the transport preference.
    pub async fn update_settings(&self, settings: Settings) {
        let preference = settings.transport_preference;
        self.inner.settings.save(settings).await;
        match preference {
            TransportPreference::Persistent => {
                self.inner.transport.set_auto_reconnect(true);
                self.inner.transport.connect();
            }
            TransportPreference::RequestOnly => {
                self.inner.transport.set_auto_reconnect(false);
                self.inner.transport.disconnect();
            }
        }
        self.inner.notices.success("Settings saved");
    }

    /// Clear the remote conversation state, then the local log.
    pub async fn reset(&self) -> Result<(), ClientError> {
        if let Err(err) = self.inner.request.reset().await {
            self.inner.notices.error(err.user_message());
            return Err(err);
        }
        self.inner.conversation.clear();
        self.inner.notices.success("Conversation cleared");
        Ok(())
    }

    pub fn subscribe_typing(&self) -> watch::Receiver<bool> {
        self.inner.typing_tx.subscribe()
    }

    pub fn is_busy(&self) -> bool {
        self.inner.busy.load(Ordering::SeqCst)
    }
}

impl RouterInner {
    /// Consume the inbound event queue in arrival order, plus connection
    /// state changes that cut an exchange short.
    async fn pump(self: Arc<Self>, mut events: mpsc::Receiver<TransportEvent>) {
        let mut state_rx = self.transport.subscribe_state();
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    None => break,
                    Some(TransportEvent::Typing(active)) => {
                        self.typing_tx.send_replace(active);
                    }
                    Some(TransportEvent::Message(text)) => {
                        self.conversation.append(ChatMessage::assistant(text));
                        self.finish_channel_exchange();
                    }
                    Some(TransportEvent::Error(reason)) => {
                        self.notices.error(reason);
                        self.finish_channel_exchange();
                    }
                },
                _ = state_rx.changed() => {
                    let state = *state_rx.borrow();
                    if state != ConnectionState::Connected
                        && self.awaiting_channel_reply.swap(false, Ordering::SeqCst)
                    {
                        self.typing_tx.send_replace(false);
                        self.busy.store(false, Ordering::SeqCst);
                        self.notices
                            .error("Connection lost before a reply arrived.");
                    }
                }
            }
        }
    }

    fn finish_channel_exchange(&self) {
        self.typing_tx.send_replace(false);
        self.awaiting_channel_reply.store(false, Ordering::SeqCst);
        self.busy.store(false, Ordering::SeqCst);
    }
}
