// ChatLLM API -- mcp/transport
//! Outbound half of the split channel: JSON-RPC messages POSTed to the
//! callback URL announced on the stream.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use url::Url;

use super::error::McpError;

/// Result of an accepted POST.
#[derive(Debug, Clone, PartialEq)]
pub enum PostOutcome {
    /// 202 (or a 200 without a JSON-RPC body): the answer will arrive on the stream.
    Accepted,
    /// 200 carrying the JSON-RPC response synchronously.
    Echo(Value),
}

#[derive(Debug, Clone)]
pub struct Transport {
    http: Client,
    timeout: Duration,
}

impl Transport {
    pub fn new(http: Client, timeout: Duration) -> Self {
        Self { http, timeout }
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    pub async fn post<T: Serialize + ?Sized>(&self, url: &Url, body: &T) -> Result<PostOutcome, McpError> {
        let response = self
            .http
            .post(url.clone())
            .header("Content-Type", "application/json")
            .header("Accept", "application/json, text/event-stream")
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| McpError::connection(format!("POST to '{}' failed: {}", url, e)))?;

        let status = response.status();
        match status {
            StatusCode::ACCEPTED => Ok(PostOutcome::Accepted),
            StatusCode::OK => {
                let text = response.text().await.unwrap_or_default();
                Ok(parse_echo(&text))
            }
            _ => {
                let body_text = response.text().await.unwrap_or_default();
                tracing::warn!("MCP: callback endpoint rejected message with HTTP {}", status);
                Err(McpError::connection(format!(
                    "callback endpoint returned HTTP {}: {}",
                    status,
                    truncate_str(&body_text, 500)
                )))
            }
        }
    }
}

/// A 200 body only counts as an echo when it is a JSON-RPC response object.
fn parse_echo(text: &str) -> PostOutcome {
    match serde_json::from_str::<Value>(text) {
        Ok(v) if v.get("result").is_some() || v.get("error").is_some() => PostOutcome::Echo(v),
        _ => PostOutcome::Accepted,
    }
}

pub(crate) fn truncate_str(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        let boundary = s
            .char_indices()
            .take_while(|(i, _)| *i < max_len)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(max_len);
        format!("{}...", &s[..boundary])
    }
}
