use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One exchanged message. Messages carry no identity key; repeated appends
/// of identical content are distinct entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Append-only, session-scoped log of exchanged messages.
///
/// Insertion order is display order. The log lives in memory only; the view
/// layer observes it through [`ConversationStore::subscribe`] and never
/// mutates it directly.
#[derive(Clone)]
pub struct ConversationStore {
    messages: Arc<RwLock<Vec<ChatMessage>>>,
    revision_tx: Arc<watch::Sender<u64>>,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationStore {
    pub fn new() -> Self {
        let (revision_tx, _) = watch::channel(0);
        Self {
            messages: Arc::new(RwLock::new(Vec::new())),
            revision_tx: Arc::new(revision_tx),
        }
    }

    /// The only mutator during an exchange. Cannot fail.
    pub fn append(&self, message: ChatMessage) {
        self.messages.write().push(message);
        self.revision_tx.send_modify(|rev| *rev += 1);
    }

    /// Empty the log. Only the reset flow uses this.
    pub fn clear(&self) {
        self.messages.write().clear();
        self.revision_tx.send_modify(|rev| *rev += 1);
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages.read().clone()
    }

    pub fn len(&self) -> usize {
        self.messages.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.read().is_empty()
    }

    /// Change signal for observers; the value is a monotonically increasing
    /// revision counter.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision_tx.subscribe()
    }
}
