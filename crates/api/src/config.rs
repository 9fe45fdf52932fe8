use std::path::PathBuf;
use std::time::Duration;

use apilytics_core::config::{env_or, ConfigError};
use apilytics_core::rate_limit::{RateLimitPolicy, DEFAULT_LIMIT, DEFAULT_WINDOW};
use axum::http::HeaderValue;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins. Empty means any origin.
    pub cors_origins: Vec<HeaderValue>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for the flush workers to drain (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Per-client admission ceiling.
    pub rate_limit: RateLimitPolicy,
    /// Take the client address from `X-Forwarded-For` / `X-Real-IP` when
    /// present (default: `true`). Disable when not behind a proxy.
    pub trust_forwarded_headers: bool,
    /// Warnings and errors are also appended here when set.
    pub log_file: Option<PathBuf>,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default   |
    /// |---------------------------|-----------|
    /// | `HOST`                    | `0.0.0.0` |
    /// | `PORT`                    | `3000`    |
    /// | `CORS_ORIGINS`            | `*`       |
    /// | `REQUEST_TIMEOUT_SECS`    | `30`      |
    /// | `SHUTDOWN_TIMEOUT_SECS`   | `30`      |
    /// | `RATE_LIMIT_PER_WINDOW`   | `100`     |
    /// | `RATE_LIMIT_WINDOW_MS`    | `1000`    |
    /// | `TRUST_FORWARDED_HEADERS` | `true`    |
    /// | `LOG_FILE`                | unset     |
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env_or("HOST", "0.0.0.0".to_string())?;
        let port = env_or("PORT", 3000u16)?;
        let cors_origins = parse_cors_origins(&env_or("CORS_ORIGINS", "*".to_string())?)?;
        let request_timeout_secs = env_or("REQUEST_TIMEOUT_SECS", 30u64)?;
        let shutdown_timeout_secs = env_or("SHUTDOWN_TIMEOUT_SECS", 30u64)?;

        let limit = env_or("RATE_LIMIT_PER_WINDOW", DEFAULT_LIMIT)?;
        let window_ms = env_or("RATE_LIMIT_WINDOW_MS", DEFAULT_WINDOW.as_millis() as u64)?;
        if limit == 0 || window_ms == 0 {
            return Err(ConfigError::Invalid {
                name: if limit == 0 {
                    "RATE_LIMIT_PER_WINDOW"
                } else {
                    "RATE_LIMIT_WINDOW_MS"
                },
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }

        let trust_forwarded_headers = env_or("TRUST_FORWARDED_HEADERS", true)?;
        let log_file = std::env::var_os("LOG_FILE")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            rate_limit: RateLimitPolicy {
                limit,
                window: Duration::from_millis(window_ms),
            },
            trust_forwarded_headers,
            log_file,
        })
    }
}

/// Parse a comma-separated origin list. `*` (or an empty list) allows any
/// origin and yields an empty vector.
pub fn parse_cors_origins(raw: &str) -> Result<Vec<HeaderValue>, ConfigError> {
    let origins: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    if origins.iter().any(|o| *o == "*") {
        return Ok(Vec::new());
    }

    origins
        .into_iter()
        .map(|o| {
            o.parse::<HeaderValue>().map_err(|e| ConfigError::Invalid {
                name: "CORS_ORIGINS",
                value: o.to_string(),
                reason: e.to_string(),
            })
        })
        .collect()
}
