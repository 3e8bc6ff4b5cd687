use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::mcp::ToolDescriptor;

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WelcomeResponse {
    pub message: String,
}

/// Snapshot of the MCP session, as reported by `/api/health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpSessionInfo {
    pub state: String,
    pub ready: bool,
    pub base_url: String,
    pub endpoint: Option<String>,
    pub pending_requests: usize,
    pub tools: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub app: String,
    pub debug: bool,
    pub uptime_seconds: u64,
    pub mcp: McpSessionInfo,
}

// ---------------------------------------------------------------------------
// MCP tools
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ToolListQuery {
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolListResponse {
    pub tools: Vec<ToolDescriptor>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResponse {
    pub tool: String,
    /// Raw `tools/call` result, exactly as the server returned it.
    pub result: Value,
    /// Joined `text` content parts, when the result carries any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}
