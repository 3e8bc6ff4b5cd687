pub mod config;
pub mod handlers;
pub mod mcp;
pub mod models;
pub mod state;

use axum::routing::{get, post};
use axum::Router;

use state::AppState;

/// Build the application router with the given state.
/// Extracted from `main()` so integration tests can construct the app
/// without binding to a network port.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::welcome))
        // Health
        .route("/api/health", get(handlers::health))
        // MCP
        .route("/api/mcp/health", get(handlers::mcp_health))
        .route("/api/mcp/tools", get(handlers::list_tools))
        .route("/api/mcp/tools/{name}", post(handlers::call_tool))
        .with_state(state)
}
