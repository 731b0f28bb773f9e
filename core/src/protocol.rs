use crate::error::ClientError;
use serde::{Deserialize, Serialize};

/// Normalized inbound event, regardless of originating transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Typing(bool),
    Message(String),
    Error(String),
}

/// Outbound frame for the persistent channel.
///
/// The server expects camelCase `maxLength` on the socket, unlike the
/// snake_case body of the HTTP fallback.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundFrame<'a> {
    pub message: &'a str,
    pub temperature: f32,
    #[serde(rename = "maxLength")]
    pub max_length: u32,
}

impl<'a> OutboundFrame<'a> {
    pub fn encode(&self) -> Result<String, ClientError> {
        serde_json::to_string(self).map_err(|err| ClientError::Protocol(err.to_string()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum InboundFrame {
    Typing {
        #[serde(rename = "isTyping")]
        is_typing: bool,
    },
    // The server attaches extra fields (timestamp, isTyping) to message
    // frames; they are irrelevant to the client and ignored.
    Message {
        response: String,
    },
    Error {
        error: String,
    },
}

/// Decode a raw text payload from the persistent channel.
///
/// An unrecognized shape is a [`ClientError::Protocol`]; the caller logs it
/// and keeps the conversation log untouched.
pub fn decode_event(raw: &str) -> Result<TransportEvent, ClientError> {
    let frame: InboundFrame =
        serde_json::from_str(raw).map_err(|err| ClientError::Protocol(err.to_string()))?;
    Ok(match frame {
        InboundFrame::Typing { is_typing } => TransportEvent::Typing(is_typing),
        InboundFrame::Message { response } => TransportEvent::Message(response),
        InboundFrame::Error { error } => TransportEvent::Error(error),
    })
}
