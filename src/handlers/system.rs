// ---------------------------------------------------------------------------
// handlers/system.rs -- Welcome and health
// ---------------------------------------------------------------------------

use axum::extract::State;
use axum::Json;

use crate::mcp::SessionState;
use crate::models::{HealthResponse, McpSessionInfo, WelcomeResponse};
use crate::state::AppState;

/// GET /
pub async fn welcome(State(state): State<AppState>) -> Json<WelcomeResponse> {
    Json(WelcomeResponse {
        message: format!("Welcome to {}!", state.settings.app_name),
    })
}

/// GET /api/health -- app status plus the MCP session snapshot.
///
/// Always 200: a failed MCP session reports `"degraded"` instead of erroring.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let session = state.mcp.state();
    let status = match &session {
        SessionState::Ready => "ok",
        SessionState::Failed(_) => "degraded",
        _ => "starting",
    };
    let tools = state.tools.read().await.len();

    Json(HealthResponse {
        status: status.to_string(),
        version: state.settings.app_version.clone(),
        app: state.settings.app_name.clone(),
        debug: state.settings.debug,
        uptime_seconds: state.start_time.elapsed().as_secs(),
        mcp: McpSessionInfo {
            state: session.to_string(),
            ready: session.is_ready(),
            base_url: state.settings.mcp.base_url.clone(),
            endpoint: state.mcp.endpoint().map(|u| u.to_string()),
            pending_requests: state.mcp.pending_requests(),
            tools,
        },
    })
}
