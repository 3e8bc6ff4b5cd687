// ChatLLM API -- mcp
//! MCP (Model Context Protocol) client over the SSE split-channel transport.
//!
//! **Listener** (`listener`): owns the `GET /sse` stream, parses frames
//! (`frame`) and routes them.
//!
//! **Session** (`session`): the `initialize` / `notifications/initialized`
//! handshake; ordinary calls are gated on it.
//!
//! **Correlator** (`correlator`): pending-request table keyed by JSON-RPC id,
//! with per-call timeouts.
//!
//! **Client** (`client`): the public `call()` surface plus `tools/list` and
//! `tools/call` conveniences. Failures are always one of [`McpError`]'s three kinds.
//!
//! Protocol: <https://spec.modelcontextprotocol.io/2024-11-05/basic/transports/>

pub mod client;
pub mod config;
pub mod correlator;
pub mod error;
pub mod frame;
pub mod health;
pub mod jsonrpc;
mod listener;
pub mod registry;
pub mod session;
pub mod transport;

pub use client::{text_content, McpClient, ToolDescriptor};
pub use config::McpClientConfig;
pub use error::McpError;
pub use registry::ToolRegistry;
pub use session::SessionState;
