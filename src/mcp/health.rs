// ChatLLM API -- mcp/health
//! Out-of-band liveness check for the MCP server (`GET {base}/health`).
//!
//! Independent of the SSE session: it opens no stream and never fails the client.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;

pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    pub online: bool,
    pub detail: String,
}

pub async fn check_connection(http: &Client, base_url: &str, timeout: Duration) -> HealthStatus {
    let url = format!("{}/health", base_url.trim_end_matches('/'));

    match http.get(&url).timeout(timeout).send().await {
        Ok(resp) if resp.status().is_success() => {
            tracing::info!("MCP: health check OK");
            HealthStatus {
                online: true,
                detail: "MCP online".to_string(),
            }
        }
        Ok(resp) => {
            tracing::warn!("MCP: health check returned HTTP {}", resp.status());
            HealthStatus {
                online: false,
                detail: format!("MCP responded with status {}", resp.status().as_u16()),
            }
        }
        Err(e) => {
            tracing::error!("MCP: health check failed: {}", e);
            HealthStatus {
                online: false,
                detail: e.to_string(),
            }
        }
    }
}
