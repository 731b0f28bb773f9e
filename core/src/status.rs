use crate::transport::{ConnectionState, TransportManager};
use tokio::sync::watch;

/// Which channel a send issued right now would use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveChannel {
    PersistentChannel,
    Fallback,
}

/// Derive the user-facing channel status from the connection state.
/// Stateless; recompute on every state change.
pub fn active_channel(state: ConnectionState) -> ActiveChannel {
    match state {
        ConnectionState::Connected => ActiveChannel::PersistentChannel,
        ConnectionState::Disconnected
        | ConnectionState::Connecting
        | ConnectionState::ClosedPendingRetry => ActiveChannel::Fallback,
    }
}

/// Thin observer over the transport's state changes for the view layer.
pub struct ConnectionStatusPublisher {
    state_rx: watch::Receiver<ConnectionState>,
}

impl ConnectionStatusPublisher {
    pub fn new(transport: &TransportManager) -> Self {
        Self {
            state_rx: transport.subscribe_state(),
        }
    }

    pub fn current(&self) -> ActiveChannel {
        active_channel(*self.state_rx.borrow())
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Wait for the next state change and return the derived status.
    pub async fn changed(&mut self) -> Option<(ConnectionState, ActiveChannel)> {
        self.state_rx.changed().await.ok()?;
        let state = *self.state_rx.borrow();
        Some((state, active_channel(state)))
    }
}
