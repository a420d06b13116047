// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client configuration loaded from environment variables.
//!
//! A `.env` file in the working directory is honored for local use.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default HTTP timeout for document store and auth requests.
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;

/// Default margin before access-token expiry at which we refresh proactively.
const DEFAULT_TOKEN_REFRESH_MARGIN_SECS: i64 = 30;

/// Sync client configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the document store API (no trailing slash)
    pub api_base_url: String,
    /// Login endpoint
    pub login_url: String,
    /// Refresh endpoint; `None` disables refresh entirely
    pub refresh_url: Option<String>,
    /// Directory holding the durable credential/queue store
    pub state_dir: PathBuf,
    /// Per-request HTTP timeout
    pub http_timeout: Duration,
    /// Refresh this long before the access token actually expires
    pub token_refresh_margin: chrono::Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let api_base_url = env::var("DIAGRAM_API_URL")
            .map(|v| normalize_base_url(&v))
            .map_err(|_| ConfigError::Missing("DIAGRAM_API_URL"))?;

        if api_base_url.is_empty() {
            return Err(ConfigError::Invalid("DIAGRAM_API_URL", "empty".to_string()));
        }

        let login_url =
            env::var("DIAGRAM_LOGIN_URL").unwrap_or_else(|_| format!("{api_base_url}/auth/login"));

        // An explicitly empty refresh URL means the issuer does not support refresh.
        let refresh_url = match env::var("DIAGRAM_REFRESH_URL") {
            Ok(v) if v.trim().is_empty() => None,
            Ok(v) => Some(v.trim().to_string()),
            Err(_) => Some(format!("{api_base_url}/auth/refresh")),
        };

        let http_timeout_secs = parse_var("DIAGRAM_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?;
        let margin_secs = parse_var(
            "DIAGRAM_TOKEN_REFRESH_MARGIN_SECS",
            DEFAULT_TOKEN_REFRESH_MARGIN_SECS,
        )?;

        Ok(Self {
            api_base_url,
            login_url,
            refresh_url,
            state_dir: env::var("DIAGRAM_SYNC_STATE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".diagram-sync")),
            http_timeout: Duration::from_secs(http_timeout_secs),
            token_refresh_margin: chrono::Duration::seconds(margin_secs),
        })
    }

    /// Config pointing every endpoint at `base_url` with default tuning.
    pub fn for_base_url(base_url: &str) -> Self {
        let api_base_url = normalize_base_url(base_url);
        Self {
            login_url: format!("{api_base_url}/auth/login"),
            refresh_url: Some(format!("{api_base_url}/auth/refresh")),
            api_base_url,
            state_dir: PathBuf::from(".diagram-sync"),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            token_refresh_margin: chrono::Duration::seconds(DEFAULT_TOKEN_REFRESH_MARGIN_SECS),
        }
    }

    /// Build the shared HTTP client honoring the configured timeout.
    pub fn http_client(&self) -> anyhow::Result<reqwest::Client> {
        use anyhow::Context;

        reqwest::Client::builder()
            .timeout(self.http_timeout)
            .build()
            .context("failed building document store HTTP client")
    }
}

fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, raw)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
