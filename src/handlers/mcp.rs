// ---------------------------------------------------------------------------
// handlers/mcp.rs -- MCP health check, tool listing and tool calls
// ---------------------------------------------------------------------------

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde_json::{json, Value};

use crate::mcp::health::{check_connection, HealthStatus, DEFAULT_HEALTH_TIMEOUT};
use crate::mcp::text_content;
use crate::models::{ToolCallResponse, ToolListQuery, ToolListResponse};
use crate::state::AppState;

use super::{ApiError, ApiErrorWithDetails};

/// GET /api/mcp/health -- out-of-band check; never touches the SSE session.
pub async fn mcp_health(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(check_connection(&state.client, &state.settings.mcp.base_url, DEFAULT_HEALTH_TIMEOUT).await)
}

/// GET /api/mcp/tools[?refresh=true]
pub async fn list_tools(
    State(state): State<AppState>,
    Query(query): Query<ToolListQuery>,
) -> Result<Json<ToolListResponse>, ApiErrorWithDetails> {
    if query.refresh {
        state.refresh_tools().await?;
    }

    let tools = state.tools.read().await.all();
    Ok(Json(ToolListResponse {
        count: tools.len(),
        tools,
    }))
}

/// POST /api/mcp/tools/{name} -- body is the tool's argument object (empty body = `{}`).
pub async fn call_tool(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<ToolCallResponse>, ApiErrorWithDetails> {
    let arguments = parse_arguments(&body)?;

    tracing::info!(tool = %name, "MCP: calling tool");
    let result = state.mcp.call_tool(&name, arguments).await?;

    Ok(Json(ToolCallResponse {
        text: text_content(&result),
        tool: name,
        result,
    }))
}

fn parse_arguments(body: &[u8]) -> Result<Value, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(json!({}));
    }
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {}", e)))?;
    match value {
        Value::Object(_) => Ok(value),
        Value::Null => Ok(json!({})),
        _ => Err(ApiError::BadRequest(
            "Tool arguments must be a JSON object".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_means_no_arguments() {
        assert_eq!(parse_arguments(b"").unwrap(), json!({}));
        assert_eq!(parse_arguments(b"  \n").unwrap(), json!({}));
        assert_eq!(parse_arguments(b"null").unwrap(), json!({}));
    }

    #[test]
    fn object_body_passes_through() {
        assert_eq!(
            parse_arguments(br#"{"month": "2025-01"}"#).unwrap(),
            json!({"month": "2025-01"})
        );
    }

    #[test]
    fn non_object_body_is_rejected() {
        assert!(matches!(parse_arguments(b"[1,2]"), Err(ApiError::BadRequest(_))));
        assert!(matches!(parse_arguments(b"{oops"), Err(ApiError::BadRequest(_))));
    }
}
