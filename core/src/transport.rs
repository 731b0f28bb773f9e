use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::protocol::{self, OutboundFrame, TransportEvent};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    ClosedPendingRetry,
}

/// Reconnection schedule: capped exponential backoff with jitter and an
/// attempt ceiling. Owned by [`TransportManager`]; exhausting the schedule
/// parks the manager in `Disconnected` until the next explicit `connect()`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Jitter fraction in [0, 1]; each delay is scaled by a random factor
    /// in `[1 - jitter, 1 + jitter]`.
    pub jitter: f64,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(3),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            jitter: 0.2,
            max_attempts: 10,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (zero-based), or `None` once the
    /// schedule is exhausted.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        let backoff = self.base_delay.as_millis() as f64 * self.multiplier.powi(attempt as i32);
        let jittered = backoff * (1.0 + (fastrand::f64() - 0.5) * 2.0 * self.jitter);
        let capped = jittered.min(self.max_delay.as_millis() as f64);
        Some(Duration::from_millis(capped as u64))
    }
}

/// Owner of the persistent channel: socket handle, retry schedule, and the
/// bounded inbound event queue.
///
/// Inbound text frames are decoded into [`TransportEvent`] and forwarded in
/// arrival order into one bounded queue created at construction; the
/// consumer takes the receiving half once via [`TransportManager::take_events`].
#[derive(Clone)]
pub struct TransportManager {
    inner: Arc<Inner>,
}

struct Inner {
    ws_url: String,
    retry: RetryPolicy,
    state_tx: watch::Sender<ConnectionState>,
    events_tx: mpsc::Sender<TransportEvent>,
    events_rx: Mutex<Option<mpsc::Receiver<TransportEvent>>>,
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    // Bumped on every connect()/disconnect(); a session or scheduled retry
    // that observes a newer generation aborts.
    generation: watch::Sender<u64>,
    auto_reconnect: AtomicBool,
}

impl TransportManager {
    pub fn new(config: &ClientConfig) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (events_tx, events_rx) = mpsc::channel(config.event_queue_capacity);
        let (generation, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                ws_url: config.ws_url.clone(),
                retry: config.retry.clone(),
                state_tx,
                events_tx,
                events_rx: Mutex::new(Some(events_rx)),
                outbound: Mutex::new(None),
                generation,
                auto_reconnect: AtomicBool::new(true),
            }),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state_tx.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Receiving half of the inbound event queue. Yields `Some` exactly once.
    pub fn take_events(&self) -> Option<mpsc::Receiver<TransportEvent>> {
        self.inner.events_rx.lock().take()
    }

    /// Whether a close/error should schedule a reconnect. Follows the
    /// transport preference; explicit `disconnect()` always wins regardless.
    pub fn set_auto_reconnect(&self, enabled: bool) {
        self.inner.auto_reconnect.store(enabled, Ordering::Relaxed);
    }

    /// Open the persistent channel unless it is already open or opening.
    pub fn connect(&self) {
        if matches!(
            self.state(),
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            return;
        }
        let mut session = 0;
        self.inner.generation.send_modify(|gen| {
            *gen += 1;
            session = *gen;
        });
        self.inner
            .state_tx
            .send_replace(ConnectionState::Connecting);
        let inner = self.inner.clone();
        tokio::spawn(async move {
            inner.run(session).await;
        });
    }

    /// Close the channel and cancel any pending retry. Terminal until the
    /// next `connect()`.
    pub fn disconnect(&self) {
        self.inner.generation.send_modify(|gen| *gen += 1);
        self.inner.outbound.lock().take();
        self.inner
            .state_tx
            .send_replace(ConnectionState::Disconnected);
        info!("persistent channel disconnected");
    }

    /// Send one frame; fails unless the channel is connected.
    pub fn send(&self, frame: &OutboundFrame<'_>) -> Result<(), ClientError> {
        if self.state() != ConnectionState::Connected {
            return Err(ClientError::TransportUnavailable);
        }
        let payload = frame.encode()?;
        let outbound = self.inner.outbound.lock();
        match outbound.as_ref() {
            Some(tx) if tx.send(payload).is_ok() => Ok(()),
            _ => Err(ClientError::TransportUnavailable),
        }
    }
}

impl Inner {
    async fn run(self: Arc<Self>, session: u64) {
        let mut gen_rx = self.generation.subscribe();
        let mut attempt: u32 = 0;
        loop {
            if *gen_rx.borrow() != session {
                return;
            }
            match connect_async(self.ws_url.as_str()).await {
                Ok((stream, _)) => {
                    if *gen_rx.borrow() != session {
                        return;
                    }
                    info!(url = %self.ws_url, "persistent channel connected");
                    attempt = 0;
                    self.state_tx.send_replace(ConnectionState::Connected);

                    let (mut sink, mut source) = stream.split();
                    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
                    *self.outbound.lock() = Some(out_tx);
                    let writer = tokio::spawn(async move {
                        while let Some(payload) = out_rx.recv().await {
                            if sink.send(Message::Text(payload)).await.is_err() {
                                return;
                            }
                        }
                        let _ = sink.send(Message::Close(None)).await;
                    });

                    loop {
                        tokio::select! {
                            _ = gen_rx.changed() => {
                                if *gen_rx.borrow() != session {
                                    writer.abort();
                                    return;
                                }
                            }
                            frame = source.next() => match frame {
                                Some(Ok(Message::Text(text))) => self.forward(&text).await,
                                Some(Ok(Message::Close(_))) | None => break,
                                Some(Ok(_)) => {}
                                Some(Err(err)) => {
                                    warn!(error = %err, "persistent channel error");
                                    break;
                                }
                            }
                        }
                    }
                    writer.abort();
                    self.outbound.lock().take();
                    debug!("persistent channel closed");
                }
                Err(err) => {
                    warn!(error = %err, url = %self.ws_url, "failed to open persistent channel");
                }
            }

            if *gen_rx.borrow() != session {
                return;
            }
            if !self.auto_reconnect.load(Ordering::Relaxed) {
                self.state_tx.send_replace(ConnectionState::Disconnected);
                return;
            }
            let Some(delay) = self.retry.delay_for(attempt) else {
                warn!(
                    attempts = self.retry.max_attempts,
                    "reconnect schedule exhausted, staying disconnected"
                );
                self.state_tx.send_replace(ConnectionState::Disconnected);
                return;
            };
            attempt += 1;
            self.state_tx
                .send_replace(ConnectionState::ClosedPendingRetry);
            debug!(?delay, attempt, "scheduling reconnect");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = gen_rx.changed() => {}
            }
            if *gen_rx.borrow() != session {
                return;
            }
            self.state_tx.send_replace(ConnectionState::Connecting);
        }
    }

    /// Decode one inbound payload and push it onto the event queue. An
    /// undecodable payload is logged and surfaced as a generic error event;
    /// it never reaches the conversation log.
    async fn forward(&self, raw: &str) {
        let event = match protocol::decode_event(raw) {
            Ok(event) => event,
            Err(err) => {
                warn!(error = %err, "dropping undecodable inbound payload");
                TransportEvent::Error("received an unreadable reply from the server".to_string())
            }
        };
        if self.events_tx.send(event).await.is_err() {
            debug!("inbound event queue consumer is gone");
        }
    }
}
