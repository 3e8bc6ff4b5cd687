// ChatLLM API -- state
// Application state shared by all handlers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Client;
use tokio::sync::RwLock;

use crate::config::Settings;
use crate::mcp::{McpClient, McpError, ToolRegistry};

/// Central application state. Clone-friendly -- everything shared sits behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub client: Client,
    /// The one MCP session of this process.
    pub mcp: Arc<McpClient>,
    /// Remote tool descriptors, refreshed from `tools/list`.
    pub tools: Arc<RwLock<ToolRegistry>>,
    pub start_time: Instant,
}

impl AppState {
    /// Build the shared HTTP client and start the MCP session in the background.
    pub fn new(settings: Settings) -> Result<Self, McpError> {
        let client = build_http_client();
        let mcp = McpClient::start(client.clone(), settings.mcp.clone())?;

        tracing::info!(
            "AppState initialised -- {} v{} (MCP at {})",
            settings.app_name,
            settings.app_version,
            settings.mcp.base_url
        );

        Ok(Self::with_client(settings, client, mcp))
    }

    /// Assemble state around an already started MCP client.
    pub fn with_client(settings: Settings, client: Client, mcp: McpClient) -> Self {
        Self {
            settings: Arc::new(settings),
            client,
            mcp: Arc::new(mcp),
            tools: Arc::new(RwLock::new(ToolRegistry::new())),
            start_time: Instant::now(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.mcp.is_ready()
    }

    /// Re-list tools from the MCP server into the registry.
    pub async fn refresh_tools(&self) -> Result<usize, McpError> {
        // Fetch outside the write lock so readers are not blocked on the round trip.
        let registry = ToolRegistry::fetch(&self.mcp).await?;
        let count = registry.len();
        *self.tools.write().await = registry;
        tracing::info!("MCP: tool registry refreshed -- {} tool(s)", count);
        Ok(count)
    }
}

pub fn build_http_client() -> Client {
    // No overall request timeout here: the SSE stream stays open for the
    // client's lifetime. Per-request timeouts are set where requests are made.
    Client::builder()
        .pool_max_idle_per_host(10)
        .connect_timeout(Duration::from_secs(5))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!("Failed to build tuned HTTP client ({}), using defaults", e);
            Client::new()
        })
}
