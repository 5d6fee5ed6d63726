use crate::error::{CortexError, Result};
use crate::stream::{resolve_ws_url, ReconnectPolicy};
use std::env;
use std::time::Duration;
use url::Url;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Streaming channel configuration
    pub stream: StreamConfig,
    /// Logging configuration
    pub log: LogConfig,
}

#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// WebSocket endpoint, absolute or relative to `origin` (default: /ws)
    pub url: String,
    /// Origin the dashboard is served from (default: http://localhost:8080)
    pub origin: Url,
    /// Reconnect automatically after an unplanned close
    pub reconnect: bool,
    /// Fixed delay between reconnect attempts in milliseconds
    pub reconnect_interval_ms: u64,
    /// Reconnect attempts allowed before giving up
    pub max_reconnect_attempts: u32,
    /// Only keep logs and status for this execution
    pub execution_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let origin = get_env_or("CORTEX_ORIGIN", "http://localhost:8080");
        let origin = Url::parse(origin.trim()).map_err(|e| {
            CortexError::InvalidConfig(format!("CORTEX_ORIGIN must be a valid URL: {}", e))
        })?;

        let execution_id = env::var("CORTEX_EXECUTION_ID")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let log_format = get_env_or("LOG_FORMAT", "pretty").to_lowercase();
        if log_format != "pretty" && log_format != "json" {
            return Err(CortexError::InvalidConfig(
                "LOG_FORMAT must be 'pretty' or 'json'".into(),
            ));
        }

        Ok(Config {
            stream: StreamConfig {
                url: get_env_or("CORTEX_WS_URL", "/ws"),
                origin,
                reconnect: get_env_or("CORTEX_RECONNECT", "true").parse().map_err(|_| {
                    CortexError::InvalidConfig("CORTEX_RECONNECT must be true or false".into())
                })?,
                reconnect_interval_ms: get_env_or("CORTEX_RECONNECT_INTERVAL_MS", "3000")
                    .parse()
                    .map_err(|_| {
                        CortexError::InvalidConfig(
                            "CORTEX_RECONNECT_INTERVAL_MS must be a valid number".into(),
                        )
                    })?,
                max_reconnect_attempts: get_env_or("CORTEX_MAX_RECONNECT_ATTEMPTS", "5")
                    .parse()
                    .map_err(|_| {
                        CortexError::InvalidConfig(
                            "CORTEX_MAX_RECONNECT_ATTEMPTS must be a valid number".into(),
                        )
                    })?,
                execution_id,
            },
            log: LogConfig {
                level: get_env_or("LOG_LEVEL", "info"),
                format: log_format,
            },
        })
    }

    /// Get the resolved WebSocket URL
    pub fn ws_url(&self) -> Result<Url> {
        resolve_ws_url(&self.stream.url, &self.stream.origin)
    }

    /// Get the reconnect policy for the socket manager
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            enabled: self.stream.reconnect,
            interval: Duration::from_millis(self.stream.reconnect_interval_ms),
            max_attempts: self.stream.max_reconnect_attempts,
        }
    }

    /// Default tracing filter directive for the library and the binary
    pub fn log_filter(&self) -> String {
        format!("cortex={0},cortex_logs={0}", self.log.level)
    }
}

/// Get environment variable with a default value
fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
