// ChatLLM API -- mcp/jsonrpc
//! JSON-RPC 2.0 envelopes exchanged with the MCP server.
//!
//! Outbound messages are typed structs; inbound frames stay as `serde_json::Value`
//! because the server owns the shape of `result` and `error`.

use serde::Serialize;
use serde_json::{json, Value};

/// Id used by the `initialize` request. The general request counter never yields it.
pub const HANDSHAKE_ID: u64 = 0;

pub const METHOD_INITIALIZE: &str = "initialize";
pub const METHOD_INITIALIZED: &str = "notifications/initialized";
pub const METHOD_TOOLS_LIST: &str = "tools/list";
pub const METHOD_TOOLS_CALL: &str = "tools/call";

/// Internal error code used when a response carries neither `result` nor `error`.
pub const INTERNAL_ERROR_CODE: i64 = -32603;

// ── Outbound ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: Value,
}

impl<'a> JsonRpcRequest<'a> {
    /// Build a request; a `null` params value is sent as an empty object.
    pub fn new(id: u64, method: &'a str, params: Value) -> Self {
        let params = if params.is_null() { json!({}) } else { params };
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

/// Fire-and-forget message: no `id`, no response expected.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcNotification<'a> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
}

impl<'a> JsonRpcNotification<'a> {
    pub fn new(method: &'a str) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
        }
    }
}

/// Params for the `initialize` request.
pub fn initialize_params(protocol_version: &str, client_name: &str, client_version: &str) -> Value {
    json!({
        "protocolVersion": protocol_version,
        "capabilities": {},
        "clientInfo": {
            "name": client_name,
            "version": client_version,
        }
    })
}

// ── Inbound ─────────────────────────────────────────────────────────────────

/// How an inbound JSON object should be routed, based on its `id`.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundId {
    /// Response to the `initialize` request.
    Handshake,
    /// Response to an ordinary request.
    Request(u64),
    /// No `id` at all: a server-initiated notification.
    Notification,
    /// An `id` this client never issues (string, negative, fractional).
    Foreign(Value),
}

pub fn classify_id(frame: &Value) -> InboundId {
    match frame.get("id") {
        None | Some(Value::Null) => InboundId::Notification,
        Some(id) => match id.as_u64() {
            Some(HANDSHAKE_ID) => InboundId::Handshake,
            Some(n) => InboundId::Request(n),
            None => InboundId::Foreign(id.clone()),
        },
    }
}

/// Outcome carried by a JSON-RPC response frame.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcOutcome {
    Result(Value),
    Error(Value),
    /// Neither `result` nor `error` present.
    Empty,
}

pub fn outcome_of(frame: &Value) -> RpcOutcome {
    if let Some(result) = frame.get("result") {
        RpcOutcome::Result(result.clone())
    } else if let Some(error) = frame.get("error") {
        RpcOutcome::Error(error.clone())
    } else {
        RpcOutcome::Empty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_envelope() {
        let req = JsonRpcRequest::new(7, "tools/list", Value::Null);
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v, json!({"jsonrpc": "2.0", "id": 7, "method": "tools/list", "params": {}}));
    }

    #[test]
    fn notification_has_no_id() {
        let v = serde_json::to_value(JsonRpcNotification::new(METHOD_INITIALIZED)).unwrap();
        assert_eq!(v, json!({"jsonrpc": "2.0", "method": "notifications/initialized"}));
        assert!(v.get("id").is_none());
    }

    #[test]
    fn classify_ids() {
        assert_eq!(classify_id(&json!({"id": 0, "result": {}})), InboundId::Handshake);
        assert_eq!(classify_id(&json!({"id": 12, "result": {}})), InboundId::Request(12));
        assert_eq!(classify_id(&json!({"method": "notifications/progress"})), InboundId::Notification);
        assert_eq!(
            classify_id(&json!({"id": "abc", "result": {}})),
            InboundId::Foreign(json!("abc"))
        );
        assert_eq!(classify_id(&json!({"id": -1})), InboundId::Foreign(json!(-1)));
    }

    #[test]
    fn outcome_prefers_result() {
        assert_eq!(outcome_of(&json!({"id": 1, "result": {"a": 1}})), RpcOutcome::Result(json!({"a": 1})));
        assert_eq!(
            outcome_of(&json!({"id": 1, "error": {"code": -32601}})),
            RpcOutcome::Error(json!({"code": -32601}))
        );
        assert_eq!(outcome_of(&json!({"id": 1})), RpcOutcome::Empty);
    }

    #[test]
    fn initialize_params_shape() {
        let p = initialize_params("2025-03-26", "ChatLLM API", "0.1.0");
        assert_eq!(p["protocolVersion"], "2025-03-26");
        assert_eq!(p["clientInfo"]["name"], "ChatLLM API");
        assert!(p["capabilities"].as_object().unwrap().is_empty());
    }
}
