// ---------------------------------------------------------------------------
// handlers/ -- HTTP interface over the shared MCP client
// Sub-modules for logical grouping; mod.rs re-exports the route handlers
// so that `crate::handlers::*` paths stay flat.
// ---------------------------------------------------------------------------

pub(crate) mod mcp;
pub(crate) mod system;

// System / health
pub use system::{health, welcome};

// MCP tools
pub use mcp::{call_tool, list_tools, mcp_health};

// ── Shared types ─────────────────────────────────────────────────────────────

use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::mcp::McpError;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// API error type for all handlers.
/// Logs full details server-side, returns sanitized JSON to the client.
///
/// Response format (structured):
/// ```json
/// {
///   "error": {
///     "code": "UPSTREAM_TIMEOUT",
///     "message": "Human-readable description",
///     "request_id": "uuid",
///     "details": { ... }       // null when absent
///   }
/// }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Upstream MCP error: {0}")]
    Upstream(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Upstream timeout: {0}")]
    UpstreamTimeout(String),
}

/// Structured error response body, serialized inside `{ "error": ... }`.
#[derive(Debug, serde::Serialize)]
pub struct StructuredApiError {
    /// Machine-readable error code (e.g. "BAD_REQUEST", "UPSTREAM_TIMEOUT").
    pub code: &'static str,
    /// Human-readable error message (sanitized).
    pub message: String,
    pub request_id: String,
    pub details: Option<Value>,
}

impl ApiError {
    fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Upstream(_) => "UPSTREAM_ERROR",
            ApiError::Unavailable(_) => "SERVICE_UNAVAILABLE",
            ApiError::UpstreamTimeout(_) => "UPSTREAM_TIMEOUT",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Message safe to return to clients. Upstream errors get a generic
    /// message; the remote error object travels in `details` instead.
    fn sanitized_message(&self) -> String {
        match self {
            ApiError::BadRequest(m) => m.clone(),
            ApiError::Upstream(_) => "Upstream MCP server returned an error".to_string(),
            ApiError::Unavailable(m) => m.clone(),
            ApiError::UpstreamTimeout(m) => m.clone(),
        }
    }

    pub fn with_details(self, details: Value) -> ApiErrorWithDetails {
        ApiErrorWithDetails {
            error: self,
            details: Some(details),
        }
    }

    fn current_request_id() -> String {
        Uuid::new_v4().to_string()
    }

    fn structured(&self, details: Option<Value>) -> StructuredApiError {
        StructuredApiError {
            code: self.error_code(),
            message: self.sanitized_message(),
            request_id: Self::current_request_id(),
            details,
        }
    }
}

fn respond(error: &ApiError, details: Option<Value>) -> axum::response::Response {
    use axum::response::IntoResponse;

    let status = error.status_code();
    let body = error.structured(details);

    tracing::error!(
        request_id = %body.request_id,
        code = body.code,
        "API error ({}): {}",
        status.as_u16(),
        error
    );

    (status, Json(json!({ "error": body }))).into_response()
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        respond(&self, None)
    }
}

/// ApiError with optional structured details attached.
/// Use `ApiError::Upstream("msg".into()).with_details(json!({...}))` to construct.
#[derive(Debug)]
pub struct ApiErrorWithDetails {
    pub error: ApiError,
    pub details: Option<Value>,
}

impl axum::response::IntoResponse for ApiErrorWithDetails {
    fn into_response(self) -> axum::response::Response {
        respond(&self.error, self.details)
    }
}

impl From<ApiError> for ApiErrorWithDetails {
    fn from(error: ApiError) -> Self {
        Self { error, details: None }
    }
}

/// Connection → 503, Timeout → 504, Remote → 502 (remote error object in `details`).
impl From<McpError> for ApiErrorWithDetails {
    fn from(err: McpError) -> Self {
        match &err {
            McpError::Connection(_) => ApiError::Unavailable(err.to_string()).into(),
            McpError::Timeout { method, after } => ApiError::UpstreamTimeout(err.to_string())
                .with_details(json!({
                    "method": method,
                    "timeout_ms": after.as_millis() as u64,
                })),
            McpError::Remote(remote) => {
                let remote = remote.clone();
                ApiError::Upstream(err.to_string()).with_details(remote)
            }
        }
    }
}
