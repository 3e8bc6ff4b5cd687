// ChatLLM API -- mcp/error
//! Failure surface of the MCP client.
//!
//! Callers only ever see these three kinds; stream and transport errors are
//! folded into [`McpError::Connection`].

use std::time::Duration;

use serde_json::Value;

#[derive(Debug, Clone, thiserror::Error)]
pub enum McpError {
    /// Stream could not be opened, endpoint never announced, handshake failed,
    /// or the callback endpoint rejected a message.
    #[error("MCP connection error: {0}")]
    Connection(String),

    /// A dispatched request never resolved within its budget.
    #[error("MCP request '{method}' timed out after {}ms", after.as_millis())]
    Timeout { method: String, after: Duration },

    /// The server answered with a JSON-RPC error object (kept verbatim).
    #[error("MCP remote error: {0}")]
    Remote(Value),
}

impl McpError {
    pub fn connection(msg: impl Into<String>) -> Self {
        McpError::Connection(msg.into())
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, McpError::Connection(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, McpError::Timeout { .. })
    }

    /// JSON-RPC `code` of a remote error, if present.
    pub fn remote_code(&self) -> Option<i64> {
        match self {
            McpError::Remote(err) => err.get("code").and_then(Value::as_i64),
            _ => None,
        }
    }

    /// JSON-RPC `message` of a remote error, if present.
    pub fn remote_message(&self) -> Option<&str> {
        match self {
            McpError::Remote(err) => err.get("message").and_then(Value::as_str),
            _ => None,
        }
    }
}
