// ChatLLM API -- mcp/client
//! MCP client facade over the split-channel transport.
//!
//! Requests go out as HTTP POSTs to a callback URL that the server announces
//! on its SSE stream; responses come back on that same stream, in any order.
//! [`McpClient::call`] hides all of that: it waits for the handshake, sends
//! the request, and suspends until the matching response (or a timeout).

use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::config::McpClientConfig;
use super::correlator::Correlator;
use super::error::McpError;
use super::jsonrpc::{METHOD_TOOLS_CALL, METHOD_TOOLS_LIST};
use super::listener;
use super::session::{Session, SessionState};
use super::transport::Transport;

// ── MCP Tool descriptor ─────────────────────────────────────────────────────

/// A tool advertised by the MCP server through `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the tool's arguments.
    #[serde(default = "empty_schema")]
    pub input_schema: Value,
}

fn empty_schema() -> Value {
    json!({"type": "object", "properties": {}})
}

// ── Shared state ────────────────────────────────────────────────────────────

/// Everything the listener task and caller tasks share.
#[derive(Debug)]
pub(crate) struct Inner {
    pub(crate) config: McpClientConfig,
    pub(crate) base: Url,
    pub(crate) stream_url: Url,
    pub(crate) transport: Transport,
    pub(crate) session: Session,
    pub(crate) correlator: Correlator,
    /// Callback URL; written once by the listener.
    pub(crate) endpoint: OnceLock<Url>,
    pub(crate) cancel: CancellationToken,
}

// ── Client ──────────────────────────────────────────────────────────────────

/// Handle to one MCP session. Owns the listener task for its whole lifetime.
///
/// Share it behind an `Arc`; every method takes `&self`.
#[derive(Debug)]
pub struct McpClient {
    inner: Arc<Inner>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl McpClient {
    /// Start the listener and the handshake in the background. Returns
    /// immediately; calls made before the session is ready wait for it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(http: Client, config: McpClientConfig) -> Result<Self, McpError> {
        let base = config.base()?;
        let stream_url = config.stream_url()?;

        let inner = Arc::new(Inner {
            transport: Transport::new(http, config.post_timeout),
            base,
            stream_url,
            session: Session::new(),
            correlator: Correlator::new(),
            endpoint: OnceLock::new(),
            cancel: CancellationToken::new(),
            config,
        });

        inner.session.begin();
        tracing::info!("MCP: starting client for {}", inner.stream_url);
        let handle = listener::spawn(inner.clone());

        Ok(Self {
            inner,
            listener: Mutex::new(Some(handle)),
        })
    }

    /// Start and wait until the session is ready. On failure the client is
    /// shut down before the error is returned.
    pub async fn connect(http: Client, config: McpClientConfig) -> Result<Self, McpError> {
        let client = Self::start(http, config)?;
        if let Err(e) = client.wait_ready().await {
            client.shutdown().await;
            return Err(e);
        }
        Ok(client)
    }

    /// Wait for the handshake gate (bounded by the endpoint + handshake budgets).
    pub async fn wait_ready(&self) -> Result<(), McpError> {
        self.inner.session.wait_ready(self.inner.config.ready_wait()).await
    }

    pub fn state(&self) -> SessionState {
        self.inner.session.state()
    }

    pub fn is_ready(&self) -> bool {
        self.state().is_ready()
    }

    /// Callback URL announced by the server, once known.
    pub fn endpoint(&self) -> Option<&Url> {
        self.inner.endpoint.get()
    }

    pub fn config(&self) -> &McpClientConfig {
        &self.inner.config
    }

    pub fn pending_requests(&self) -> usize {
        self.inner.correlator.pending_count()
    }

    // ── Calls ───────────────────────────────────────────────────────────

    /// Send a JSON-RPC request and wait for its response, using the
    /// configured request timeout. `Value::Null` params are sent as `{}`.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, McpError> {
        self.call_with_timeout(method, params, self.inner.config.request_timeout)
            .await
    }

    pub async fn call_with_timeout(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, McpError> {
        self.wait_ready().await?;

        let url = self
            .inner
            .endpoint
            .get()
            .cloned()
            .ok_or_else(|| McpError::connection("session ready without a callback endpoint"))?;

        let call = self
            .inner
            .correlator
            .dispatch(&self.inner.transport, &url, method, params)
            .await;
        self.inner.correlator.wait(call, timeout).await
    }

    /// List the tools the server exposes. Entries without a name are skipped.
    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, McpError> {
        let result = self.call(METHOD_TOOLS_LIST, json!({})).await?;

        let raw_tools = result
            .get("tools")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        let tools: Vec<ToolDescriptor> = raw_tools
            .iter()
            .filter_map(|t| {
                let Some(name) = t.get("name").and_then(|n| n.as_str()) else {
                    tracing::warn!("MCP: skipping tool descriptor without a name: {}", t);
                    return None;
                };
                Some(ToolDescriptor {
                    name: name.to_string(),
                    description: t.get("description").and_then(|d| d.as_str()).map(String::from),
                    input_schema: t.get("inputSchema").cloned().unwrap_or_else(empty_schema),
                })
            })
            .collect();

        tracing::debug!("MCP: {} tool(s) available", tools.len());
        Ok(tools)
    }

    /// Invoke a remote tool. The result shape belongs to the server and is returned as-is.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, McpError> {
        let arguments = if arguments.is_null() { json!({}) } else { arguments };
        self.call(
            METHOD_TOOLS_CALL,
            json!({
                "name": name,
                "arguments": arguments,
            }),
        )
        .await
    }

    // ── Lifecycle ───────────────────────────────────────────────────────

    /// Stop the listener, release the stream and fail anything still pending.
    /// Idempotent.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let handle = self
            .listener
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!("MCP: listener task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for McpClient {
    fn drop(&mut self) {
        self.inner.cancel.cancel();
    }
}

// ── Helpers ─────────────────────────────────────────────────────────────────

/// Join the `text` parts of an MCP `content` array (`tools/call` results).
pub fn text_content(result: &Value) -> Option<String> {
    let parts = result.get("content")?.as_array()?;
    let texts: Vec<&str> = parts
        .iter()
        .filter_map(|c| {
            if c.get("type").and_then(|t| t.as_str()) == Some("text") {
                c.get("text").and_then(|t| t.as_str())
            } else {
                None
            }
        })
        .collect();
    if texts.is_empty() {
        None
    } else {
        Some(texts.join("\n"))
    }
}
