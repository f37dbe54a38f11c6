//! Judge0 connection settings

use std::time::Duration;

/// Judge0 endpoint and credentials
#[derive(Debug, Clone)]
pub struct Judge0Config {
    /// Base URL, e.g. "https://judge0-ce.p.rapidapi.com" or a self-hosted instance
    pub base_url: String,
    /// RapidAPI key (sent as X-RapidAPI-Key)
    pub api_key: Option<String>,
    /// RapidAPI host (sent as X-RapidAPI-Host)
    pub api_host: Option<String>,
    /// Self-hosted authentication token (sent as X-Auth-Token)
    pub auth_token: Option<String>,
    /// Timeout for a single HTTP call (default: 10s)
    pub request_timeout: Duration,
}

impl Default for Judge0Config {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:2358".into(),
            api_key: None,
            api_host: None,
            auth_token: None,
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl Judge0Config {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// URL for `path` (which starts with '/') under the base URL
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}
