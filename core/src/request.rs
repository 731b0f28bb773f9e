use crate::error::ClientError;
use crate::settings::Settings;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Stateless one-shot exchange used when the persistent channel is
/// unavailable, plus the auxiliary backend collaborators.
#[async_trait]
pub trait RequestTransport: Send + Sync {
    /// One chat round trip; returns the assistant's reply text.
    async fn chat(&self, message: &str, settings: &Settings) -> Result<String, ClientError>;

    /// Clear the remote conversation state.
    async fn reset(&self) -> Result<(), ClientError>;

    /// Health probe against the backend root endpoint.
    async fn health(&self) -> Result<HealthStatus, ClientError>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Serialize)]
struct ChatRequestBody<'a> {
    message: &'a str,
    temperature: f32,
    max_length: u32,
}

#[derive(Deserialize)]
struct ChatResponseBody {
    response: String,
}

/// HTTP implementation over the backend's request/response endpoints.
pub struct HttpRequestChannel {
    base_url: String,
    http: reqwest::Client,
}

impl HttpRequestChannel {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::Client::new(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl RequestTransport for HttpRequestChannel {
    async fn chat(&self, message: &str, settings: &Settings) -> Result<String, ClientError> {
        let body = ChatRequestBody {
            message,
            temperature: settings.temperature,
            max_length: settings.max_length,
        };
        debug!(endpoint = "/api/chat", "sending fallback round trip");
        let response = self
            .http
            .post(self.endpoint("/api/chat"))
            .json(&body)
            .send()
            .await
            .map_err(|err| ClientError::RequestFailure(err.to_string()))?;
        if !response.status().is_success() {
            return Err(ClientError::RequestFailure(format!(
                "server responded with {}",
                response.status()
            )));
        }
        let parsed: ChatResponseBody = response
            .json()
            .await
            .map_err(|err| ClientError::RequestFailure(err.to_string()))?;
        Ok(parsed.response)
    }

    async fn reset(&self) -> Result<(), ClientError> {
        let response = self
            .http
            .post(self.endpoint("/api/reset"))
            .send()
            .await
            .map_err(|err| ClientError::RequestFailure(err.to_string()))?;
        if !response.status().is_success() {
            return Err(ClientError::RequestFailure(format!(
                "reset failed with {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn health(&self) -> Result<HealthStatus, ClientError> {
        let response = self
            .http
            .get(self.endpoint("/"))
            .send()
            .await
            .map_err(|err| ClientError::RequestFailure(err.to_string()))?;
        if !response.status().is_success() {
            return Err(ClientError::RequestFailure(format!(
                "health probe failed with {}",
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|err| ClientError::RequestFailure(err.to_string()))
    }
}
