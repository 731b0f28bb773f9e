use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};

const ERROR_TTL: Duration = Duration::from_secs(5);
const SUCCESS_TTL: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Error,
    Success,
}

/// Transient, auto-dismissing user notice. Never blocks further input.
#[derive(Debug, Clone)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    created: Instant,
}

impl Notice {
    fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            created: Instant::now(),
        }
    }

    pub fn is_fresh(&self) -> bool {
        let ttl = match self.kind {
            NoticeKind::Error => ERROR_TTL,
            NoticeKind::Success => SUCCESS_TTL,
        };
        self.created.elapsed() < ttl
    }
}

/// Shared sink of transient notices. Stale entries are pruned on read.
#[derive(Clone, Default)]
pub struct NoticeSink {
    inner: Arc<RwLock<Vec<Notice>>>,
}

impl NoticeSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(Notice::new(NoticeKind::Error, message));
    }

    pub fn success(&self, message: impl Into<String>) {
        self.push(Notice::new(NoticeKind::Success, message));
    }

    fn push(&self, notice: Notice) {
        self.inner.write().push(notice);
    }

    /// Notices still within their display window, oldest first.
    pub fn active(&self) -> Vec<Notice> {
        let mut notices = self.inner.write();
        notices.retain(Notice::is_fresh);
        notices.clone()
    }

    /// Total emitted and not yet pruned, regardless of freshness.
    pub fn pending_count(&self) -> usize {
        self.inner.read().len()
    }
}
