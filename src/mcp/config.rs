// ChatLLM API -- mcp/config
//! Connection settings for one MCP client instance.

use std::time::Duration;

use url::Url;

use super::error::McpError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_SSE_PATH: &str = "/sse";
pub const DEFAULT_ENDPOINT_PREFIX: &str = "/messages";
pub const DEFAULT_PROTOCOL_VERSION: &str = "2025-03-26";
pub const DEFAULT_CLIENT_NAME: &str = "ChatLLM API";

#[derive(Debug, Clone)]
pub struct McpClientConfig {
    /// Server root, e.g. `http://localhost:8000`.
    pub base_url: String,
    /// Path of the SSE stream, appended to `base_url`.
    pub sse_path: String,
    /// Data prefix that marks an endpoint announcement on the stream.
    pub endpoint_prefix: String,
    pub protocol_version: String,
    pub client_name: String,
    pub client_version: String,
    /// How long to wait for the endpoint announcement after start.
    pub endpoint_timeout: Duration,
    /// How long to wait for the `initialize` ack after the endpoint arrived.
    pub handshake_timeout: Duration,
    /// Default budget for one ordinary call.
    pub request_timeout: Duration,
    /// Per-POST HTTP timeout.
    pub post_timeout: Duration,
}

impl Default for McpClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            sse_path: DEFAULT_SSE_PATH.to_string(),
            endpoint_prefix: DEFAULT_ENDPOINT_PREFIX.to_string(),
            protocol_version: DEFAULT_PROTOCOL_VERSION.to_string(),
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
            endpoint_timeout: Duration::from_secs(5),
            handshake_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            post_timeout: Duration::from_secs(10),
        }
    }
}

impl McpClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_endpoint_timeout(mut self, timeout: Duration) -> Self {
        self.endpoint_timeout = timeout;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_client_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.client_name = name.into();
        self.client_version = version.into();
        self
    }

    /// Upper bound an ordinary call waits on the handshake gate.
    pub fn ready_wait(&self) -> Duration {
        self.endpoint_timeout + self.handshake_timeout
    }

    pub fn base(&self) -> Result<Url, McpError> {
        Url::parse(&self.base_url)
            .map_err(|e| McpError::connection(format!("invalid MCP base URL '{}': {}", self.base_url, e)))
    }

    pub fn stream_url(&self) -> Result<Url, McpError> {
        let joined = format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            self.sse_path
        );
        Url::parse(&joined).map_err(|e| McpError::connection(format!("invalid MCP stream URL '{}': {}", joined, e)))
    }
}
