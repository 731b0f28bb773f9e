use crate::transport::RetryPolicy;
use anyhow::{Context, Result};
use url::Url;

/// Tuning constants for one client instance.
///
/// Built once at startup and passed explicitly into each component
/// constructor; there is no global configuration state.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Persistent channel endpoint.
    pub ws_url: String,
    /// Base URL for the fallback request/response endpoint.
    pub api_base_url: String,
    /// Reconnection schedule for the persistent channel.
    pub retry: RetryPolicy,
    /// Capacity of the bounded inbound event queue.
    pub event_queue_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ws_url: "ws://localhost:8000/ws/chat".to_string(),
            api_base_url: "http://localhost:8000".to_string(),
            retry: RetryPolicy::default(),
            event_queue_capacity: 64,
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<()> {
        let ws = Url::parse(&self.ws_url)
            .with_context(|| format!("invalid persistent channel URL: {}", self.ws_url))?;
        if !matches!(ws.scheme(), "ws" | "wss") {
            anyhow::bail!("persistent channel URL must use ws:// or wss://");
        }
        let api = Url::parse(&self.api_base_url)
            .with_context(|| format!("invalid fallback base URL: {}", self.api_base_url))?;
        if !matches!(api.scheme(), "http" | "https") {
            anyhow::bail!("fallback base URL must use http:// or https://");
        }
        Ok(())
    }
}
