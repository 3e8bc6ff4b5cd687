// ChatLLM API -- config
//! Process settings, read from the environment (and `.env` via `dotenvy` in `main`).

use std::time::Duration;

use crate::mcp::config::{
    McpClientConfig, DEFAULT_BASE_URL, DEFAULT_CLIENT_NAME, DEFAULT_ENDPOINT_PREFIX,
    DEFAULT_PROTOCOL_VERSION, DEFAULT_SSE_PATH,
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be an integer number of seconds (got '{value}')")]
    InvalidSeconds { var: &'static str, value: String },

    #[error("{var} must be a boolean (got '{value}')")]
    InvalidBool { var: &'static str, value: String },

    #[error("PORT must be a valid port number (got '{0}')")]
    InvalidPort(String),
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub app_name: String,
    pub app_version: String,
    pub debug: bool,
    pub port: u16,
    /// Frontend origin allowed by CORS, if any.
    pub front_url: Option<String>,
    pub mcp: McpClientConfig,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let app_name = get("APP_NAME").unwrap_or_else(|| DEFAULT_CLIENT_NAME.to_string());
        let app_version = get("APP_VERSION").unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());

        let debug = match get("DEBUG") {
            Some(v) => parse_bool("DEBUG", &v)?,
            None => true,
        };

        let port = match get("PORT") {
            Some(v) => v.trim().parse::<u16>().map_err(|_| ConfigError::InvalidPort(v))?,
            None => 8080,
        };

        let defaults = McpClientConfig::default();
        let mcp = McpClientConfig {
            base_url: get("MCP_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            sse_path: get("MCP_SSE_PATH").unwrap_or_else(|| DEFAULT_SSE_PATH.to_string()),
            endpoint_prefix: get("MCP_ENDPOINT_PREFIX")
                .unwrap_or_else(|| DEFAULT_ENDPOINT_PREFIX.to_string()),
            protocol_version: get("MCP_PROTOCOL_VERSION")
                .unwrap_or_else(|| DEFAULT_PROTOCOL_VERSION.to_string()),
            client_name: app_name.clone(),
            client_version: app_version.clone(),
            endpoint_timeout: seconds(&get, "MCP_ENDPOINT_TIMEOUT_SECS", defaults.endpoint_timeout)?,
            handshake_timeout: seconds(&get, "MCP_HANDSHAKE_TIMEOUT_SECS", defaults.handshake_timeout)?,
            request_timeout: seconds(&get, "MCP_REQUEST_TIMEOUT_SECS", defaults.request_timeout)?,
            post_timeout: defaults.post_timeout,
        };

        Ok(Self {
            app_name,
            app_version,
            debug,
            port,
            front_url: get("FRONT_URL"),
            mcp,
        })
    }
}

fn seconds<G>(get: &G, var: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        Some(v) => v
            .trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| ConfigError::InvalidSeconds { var, value: v }),
        None => Ok(default),
    }
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            var,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_without_env() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.app_name, "ChatLLM API");
        assert_eq!(s.port, 8080);
        assert!(s.debug);
        assert_eq!(s.mcp.base_url, "http://localhost:8000");
        assert_eq!(s.mcp.request_timeout, Duration::from_secs(10));
        assert!(s.front_url.is_none());
    }

    #[test]
    fn overrides_flow_into_mcp_config() {
        let s = settings(&[
            ("APP_NAME", "Review API"),
            ("APP_VERSION", "2.1.0"),
            ("MCP_URL", "http://mcp:9000"),
            ("MCP_HANDSHAKE_TIMEOUT_SECS", "2"),
            ("DEBUG", "false"),
            ("FRONT_URL", "http://localhost:5173"),
        ])
        .unwrap();
        assert_eq!(s.mcp.base_url, "http://mcp:9000");
        assert_eq!(s.mcp.client_name, "Review API");
        assert_eq!(s.mcp.client_version, "2.1.0");
        assert_eq!(s.mcp.handshake_timeout, Duration::from_secs(2));
        assert!(!s.debug);
        assert_eq!(s.front_url.as_deref(), Some("http://localhost:5173"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            settings(&[("MCP_REQUEST_TIMEOUT_SECS", "ten")]),
            Err(ConfigError::InvalidSeconds { var: "MCP_REQUEST_TIMEOUT_SECS", .. })
        ));
        assert!(matches!(settings(&[("DEBUG", "maybe")]), Err(ConfigError::InvalidBool { .. })));
        assert!(matches!(settings(&[("PORT", "99999")]), Err(ConfigError::InvalidPort(_))));
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let s = settings(&[("MCP_URL", "  "), ("PORT", "")]).unwrap();
        assert_eq!(s.mcp.base_url, "http://localhost:8000");
        assert_eq!(s.port, 8080);
    }
}
