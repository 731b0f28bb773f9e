/// Failure taxonomy for the orchestrator.
///
/// Transport- and protocol-level failures are handled locally (fallback,
/// retry, or log) and only reach the user as transient notices when no
/// automatic recovery applies.
#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("persistent channel is not connected")]
    TransportUnavailable,
    #[error("malformed inbound payload: {0}")]
    Protocol(String),
    #[error("request failed: {0}")]
    RequestFailure(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("another exchange is already in flight")]
    Busy,
}

impl ClientError {
    /// Short message suitable for a transient user-facing notice.
    pub fn user_message(&self) -> String {
        match self {
            Self::TransportUnavailable => "Connection unavailable, retrying…".to_string(),
            Self::Protocol(_) => "Received an unreadable reply from the server.".to_string(),
            Self::RequestFailure(detail) => format!("Sending failed: {detail}"),
            Self::Persistence(_) => "Could not save your settings.".to_string(),
            Self::Busy => "Still waiting for the previous reply.".to_string(),
        }
    }
}
