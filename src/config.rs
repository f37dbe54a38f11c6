//! Grader configuration
//!
//! Read once at startup from the environment (after `.env` is loaded).
//! Unset variables fall back to defaults; malformed ones abort startup.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::engine::retry::RetryPolicy;
use crate::engine::sandbox::Judge0Config;
use crate::engine::PollerConfig;

#[derive(Debug, Clone)]
pub struct GraderConfig {
    /// Address the HTTP server listens on (default: 0.0.0.0:8080)
    pub bind_addr: SocketAddr,
    /// Platform backend base URL (default: http://localhost:5000/api)
    pub platform_url: String,
    pub judge0: Judge0Config,
    pub poller: PollerConfig,
    /// Timeout for platform calls (default: 10s)
    pub http_timeout: Duration,
}

impl GraderConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let judge0_defaults = Judge0Config::default();
        let poller_defaults = PollerConfig::default();
        let retry_defaults = RetryPolicy::default();

        let retry = RetryPolicy {
            max_attempts: parse_or(var("GRADER_RETRY_ATTEMPTS"), "GRADER_RETRY_ATTEMPTS", retry_defaults.max_attempts)?,
            base_delay_ms: parse_or(var("GRADER_RETRY_BASE_MS"), "GRADER_RETRY_BASE_MS", retry_defaults.base_delay_ms)?,
            max_delay_ms: parse_or(var("GRADER_RETRY_MAX_MS"), "GRADER_RETRY_MAX_MS", retry_defaults.max_delay_ms)?,
        };
        if retry.max_attempts == 0 {
            anyhow::bail!("GRADER_RETRY_ATTEMPTS must be at least 1");
        }

        let poller = PollerConfig {
            poll_interval: millis_or(var("GRADER_POLL_INTERVAL_MS"), "GRADER_POLL_INTERVAL_MS", poller_defaults.poll_interval)?,
            max_wait: millis_or(var("GRADER_MAX_WAIT_MS"), "GRADER_MAX_WAIT_MS", poller_defaults.max_wait)?,
            retry,
            fail_fast: flag(var("GRADER_FAIL_FAST"), "GRADER_FAIL_FAST")?,
        };

        let http_timeout = millis_or(
            var("GRADER_HTTP_TIMEOUT_MS"),
            "GRADER_HTTP_TIMEOUT_MS",
            judge0_defaults.request_timeout,
        )?;

        let judge0 = Judge0Config {
            api_key: var("JUDGE0_API_KEY"),
            api_host: var("JUDGE0_API_HOST"),
            auth_token: var("JUDGE0_AUTH_TOKEN"),
            request_timeout: http_timeout,
            ..Judge0Config::with_base_url(var("JUDGE0_API_URL").unwrap_or(judge0_defaults.base_url))
        };

        Ok(Self {
            bind_addr: parse_or(
                var("GRADER_BIND_ADDR"),
                "GRADER_BIND_ADDR",
                SocketAddr::from(([0, 0, 0, 0], 8080)),
            )?,
            platform_url: var("PLATFORM_API_URL").unwrap_or_else(|| "http://localhost:5000/api".into()),
            judge0,
            poller,
            http_timeout,
        })
    }
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(v) => v
            .trim()
            .parse()
            .with_context(|| format!("Invalid {}: {:?}", key, v)),
        None => Ok(default),
    }
}

fn millis_or(value: Option<String>, key: &str, default: Duration) -> Result<Duration> {
    let millis = parse_or(value, key, default.as_millis() as u64)?;
    Ok(Duration::from_millis(millis))
}

fn flag(value: Option<String>, key: &str) -> Result<bool> {
    match value.as_deref().map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        None | Some("0" | "false" | "no" | "off") => Ok(false),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some(other) => anyhow::bail!("Invalid {}: {:?}", key, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<GraderConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        GraderConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.judge0.base_url, "http://localhost:2358");
        assert!(config.judge0.api_key.is_none());
        assert_eq!(config.poller.poll_interval, Duration::from_millis(1_500));
        assert_eq!(config.poller.retry, RetryPolicy::default());
        assert!(!config.poller.fail_fast);
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("GRADER_BIND_ADDR", "127.0.0.1:9000"),
            ("JUDGE0_API_URL", "https://judge0-ce.p.rapidapi.com"),
            ("JUDGE0_API_KEY", "key"),
            ("JUDGE0_API_HOST", "judge0-ce.p.rapidapi.com"),
            ("GRADER_MAX_WAIT_MS", "5000"),
            ("GRADER_RETRY_ATTEMPTS", "5"),
            ("GRADER_FAIL_FAST", "true"),
            ("GRADER_HTTP_TIMEOUT_MS", "2500"),
        ])
        .unwrap();

        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:9000");
        assert_eq!(config.judge0.api_key.as_deref(), Some("key"));
        assert_eq!(config.judge0.request_timeout, Duration::from_millis(2_500));
        assert_eq!(config.http_timeout, Duration::from_millis(2_500));
        assert_eq!(config.poller.max_wait, Duration::from_secs(5));
        assert_eq!(config.poller.retry.max_attempts, 5);
        assert!(config.poller.fail_fast);
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let config = load(&[("JUDGE0_AUTH_TOKEN", "  "), ("GRADER_MAX_WAIT_MS", "")]).unwrap();
        assert!(config.judge0.auth_token.is_none());
        assert_eq!(config.poller.max_wait, Duration::from_secs(20));
    }

    #[test]
    fn test_malformed_values_are_rejected() {
        let err = load(&[("GRADER_POLL_INTERVAL_MS", "soon")]).unwrap_err();
        assert!(err.to_string().contains("GRADER_POLL_INTERVAL_MS"));

        assert!(load(&[("GRADER_FAIL_FAST", "maybe")]).is_err());
        assert!(load(&[("GRADER_RETRY_ATTEMPTS", "0")]).is_err());
        assert!(load(&[("GRADER_BIND_ADDR", "localhost")]).is_err());
    }
}
