//! Configuration structures.
//!
//! Defaults are overlaid with environment variables via [`Config::from_env`].

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::{Error, Result};
use crate::validation::{validate_non_empty, validate_positive};

/// Default Polygon REST endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.polygon.io";

/// Global configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Upstream market-data API.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Admission control for agent runs.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Stdio tool server.
    #[serde(default)]
    pub server: ServerConfig,

    /// Chat session behaviour.
    #[serde(default)]
    pub chat: ChatConfig,

    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Upstream (Polygon) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL every endpoint path is appended to.
    pub base_url: String,

    /// API key injected as the `apiKey` query parameter. Never serialized.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Per-request timeout.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Sliding window admission limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Admissions allowed inside one window.
    pub max_requests: u32,

    /// Window length.
    #[serde(with = "humantime_serde")]
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 3,
            window: Duration::from_secs(60),
        }
    }
}

/// Stdio server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Maximum accepted length of one JSON-RPC line, in bytes.
    pub max_line_bytes: usize,

    /// Maximum requests processed concurrently. Further requests wait for a slot.
    pub max_in_flight: usize,

    /// Write timeout in seconds per response line.
    pub write_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_line_bytes: 5 * 1024 * 1024,
            max_in_flight: 16,
            write_timeout_secs: 10,
        }
    }
}

/// Chat session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Deadline for one agent run.
    #[serde(with = "humantime_serde")]
    pub agent_timeout: Duration,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            agent_timeout: Duration::from_secs(60),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Tracing log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable JSON log formatting.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl Config {
    /// Build a configuration from defaults plus process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from defaults plus the given variable lookup.
    ///
    /// Recognized variables: `POLYGON_API_KEY`, `POLYGON_BASE_URL`,
    /// `POLYGON_TIMEOUT_SECS`, `RATE_LIMIT_MAX_REQUESTS`, `RATE_LIMIT_WINDOW_SECS`,
    /// `MARKET_QUERY_LOG_FORMAT`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Config::default();

        if let Some(key) = lookup("POLYGON_API_KEY").filter(|k| !k.trim().is_empty()) {
            config.upstream.api_key = Some(key);
        }
        if let Some(url) = lookup("POLYGON_BASE_URL").filter(|u| !u.trim().is_empty()) {
            config.upstream.base_url = url;
        }
        if let Some(secs) = lookup("POLYGON_TIMEOUT_SECS") {
            config.upstream.request_timeout =
                Duration::from_secs(parse_number(&secs, "POLYGON_TIMEOUT_SECS")?);
        }
        if let Some(max) = lookup("RATE_LIMIT_MAX_REQUESTS") {
            let max = parse_number(&max, "RATE_LIMIT_MAX_REQUESTS")?;
            config.rate_limit.max_requests = u32::try_from(max).map_err(|_| {
                Error::config(format!("RATE_LIMIT_MAX_REQUESTS value {max} exceeds u32 range"))
            })?;
        }
        if let Some(secs) = lookup("RATE_LIMIT_WINDOW_SECS") {
            config.rate_limit.window =
                Duration::from_secs(parse_number(&secs, "RATE_LIMIT_WINDOW_SECS")?);
        }
        if let Some(format) = lookup("MARKET_QUERY_LOG_FORMAT") {
            config.observability.json_logs = format.eq_ignore_ascii_case("json");
        }

        config.validate()?;
        Ok(config)
    }

    /// Check ranges. The API key is checked separately by the tool adapter.
    pub fn validate(&self) -> Result<()> {
        validate_non_empty(&self.upstream.base_url, "upstream.base_url")?;
        validate_positive(self.upstream.request_timeout.as_secs_f64(), "upstream.request_timeout")?;
        validate_positive(f64::from(self.rate_limit.max_requests), "rate_limit.max_requests")?;
        validate_positive(self.rate_limit.window.as_secs_f64(), "rate_limit.window")?;
        validate_positive(self.server.max_in_flight as f64, "server.max_in_flight")?;
        validate_positive(self.server.max_line_bytes as f64, "server.max_line_bytes")?;
        validate_positive(self.chat.agent_timeout.as_secs_f64(), "chat.agent_timeout")?;
        Ok(())
    }

    /// The API key, or a configuration error if it is absent.
    pub fn require_api_key(&self) -> Result<&str> {
        self.upstream
            .api_key
            .as_deref()
            .ok_or_else(|| Error::config("POLYGON_API_KEY is not set in the environment or .env file"))
    }
}

fn parse_number(raw: &str, var: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|e| Error::config(format!("{var}: invalid number '{raw}': {e}")))
}
