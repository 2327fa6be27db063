//! Configuration management for feedsift
//!
//! This module handles loading and validating configuration from environment
//! variables and TOML files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::pipeline::{InstagramCredentials, Politeness, ScrapeOptions};
use crate::utils::retry::RetryPolicy;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP client configuration
    pub http: HttpConfig,

    /// Scrape defaults
    pub scrape: ScrapeConfig,

    /// Instagram session
    pub instagram: InstagramConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Hard per-attempt timeout in seconds
    pub request_timeout_secs: u64,

    /// Rate limit (requests per second)
    pub requests_per_second: u32,

    /// Total attempts per request, including the first
    pub retry_attempts: u32,

    /// Base backoff delay in milliseconds
    pub retry_base_delay_ms: u64,

    /// Backoff cap in milliseconds
    pub retry_max_delay_ms: u64,

    /// Proxy URLs; each one is an egress slot
    pub proxies: Vec<String>,

    /// Politeness delay bounds in milliseconds
    pub politeness_min_ms: u64,
    pub politeness_max_ms: u64,
}

/// Scrape defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    /// Posts returned when the caller gives no limit
    pub max_posts: usize,

    /// Top-level comments kept per post
    pub comment_limit: usize,
}

/// Instagram session configuration
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InstagramConfig {
    pub session_id: Option<String>,
    pub csrf_token: Option<String>,
    pub user_id: Option<String>,
}

impl std::fmt::Debug for InstagramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstagramConfig")
            .field("session_id", &self.session_id.as_ref().map(|_| "<redacted>"))
            .field("csrf_token", &self.csrf_token.as_ref().map(|_| "<redacted>"))
            .field("user_id", &self.user_id)
            .finish()
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            requests_per_second: 2,
            retry_attempts: 4,
            retry_base_delay_ms: 3000,
            retry_max_delay_ms: 30_000,
            proxies: Vec::new(),
            politeness_min_ms: 400,
            politeness_max_ms: 1500,
        }
    }
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            max_posts: 10,
            comment_limit: 20,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let proxies = env_string("FEEDSIFT_PROXIES")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            http: HttpConfig {
                request_timeout_secs: env_parse("FEEDSIFT_REQUEST_TIMEOUT")
                    .unwrap_or(defaults.http.request_timeout_secs),
                requests_per_second: env_parse("FEEDSIFT_RATE_LIMIT")
                    .unwrap_or(defaults.http.requests_per_second),
                retry_attempts: env_parse("FEEDSIFT_RETRY_ATTEMPTS")
                    .unwrap_or(defaults.http.retry_attempts),
                retry_base_delay_ms: env_parse("FEEDSIFT_RETRY_BASE_DELAY_MS")
                    .unwrap_or(defaults.http.retry_base_delay_ms),
                retry_max_delay_ms: env_parse("FEEDSIFT_RETRY_MAX_DELAY_MS")
                    .unwrap_or(defaults.http.retry_max_delay_ms),
                proxies,
                politeness_min_ms: env_parse("FEEDSIFT_POLITENESS_MIN_MS")
                    .unwrap_or(defaults.http.politeness_min_ms),
                politeness_max_ms: env_parse("FEEDSIFT_POLITENESS_MAX_MS")
                    .unwrap_or(defaults.http.politeness_max_ms),
            },
            scrape: ScrapeConfig {
                max_posts: env_parse("FEEDSIFT_MAX_POSTS").unwrap_or(defaults.scrape.max_posts),
                comment_limit: env_parse("FEEDSIFT_COMMENT_LIMIT")
                    .unwrap_or(defaults.scrape.comment_limit),
            },
            instagram: InstagramConfig {
                session_id: env_string("FEEDSIFT_IG_SESSION_ID"),
                csrf_token: env_string("FEEDSIFT_IG_CSRF_TOKEN"),
                user_id: env_string("FEEDSIFT_IG_USER_ID"),
            },
            logging: LoggingConfig {
                level: env_string("FEEDSIFT_LOG_LEVEL").unwrap_or(defaults.logging.level),
                format: env_string("FEEDSIFT_LOG_FORMAT").unwrap_or(defaults.logging.format),
            },
        })
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.http.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than 0");
        }

        if self.http.requests_per_second == 0 {
            anyhow::bail!("requests_per_second must be greater than 0");
        }

        if self.http.retry_attempts == 0 {
            anyhow::bail!("retry_attempts must be greater than 0");
        }

        if self.http.retry_base_delay_ms > self.http.retry_max_delay_ms {
            anyhow::bail!("retry_base_delay_ms must not exceed retry_max_delay_ms");
        }

        if self.http.politeness_min_ms > self.http.politeness_max_ms {
            anyhow::bail!("politeness_min_ms must not exceed politeness_max_ms");
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            anyhow::bail!("log format must be 'text' or 'json', got '{}'", self.logging.format);
        }

        Ok(())
    }

    /// Get request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.http.request_timeout_secs)
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::with_delays(
            self.http.retry_attempts,
            self.http.retry_base_delay_ms,
            self.http.retry_max_delay_ms,
        )
    }

    #[must_use]
    pub fn politeness(&self) -> Politeness {
        Politeness {
            min_ms: self.http.politeness_min_ms,
            max_ms: self.http.politeness_max_ms,
        }
    }

    /// Scrape options with an optional per-call post limit
    #[must_use]
    pub fn scrape_options(&self, max_posts: Option<usize>, with_comments: bool) -> ScrapeOptions {
        ScrapeOptions {
            max_posts: max_posts.unwrap_or(self.scrape.max_posts),
            with_comments,
            comment_limit: self.scrape.comment_limit,
        }
    }

    /// Instagram credentials; empty when no session id is configured
    #[must_use]
    pub fn instagram_credentials(&self) -> InstagramCredentials {
        InstagramCredentials {
            session_id: self.instagram.session_id.clone().unwrap_or_default(),
            csrf_token: self.instagram.csrf_token.clone(),
            user_id: self.instagram.user_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_rate_limit() {
        let mut config = Config::default();
        config.http.requests_per_second = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_politeness_bounds() {
        let mut config = Config::default();
        config.http.politeness_min_ms = 2000;
        config.http.politeness_max_ms = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_request_timeout_conversion() {
        let config = Config::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_retry_policy_mirrors_config() {
        let policy = Config::default().retry_policy();
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.delay_before(2), Duration::from_millis(3000));
    }

    #[test]
    fn test_missing_instagram_session_gives_empty_credentials() {
        let credentials = Config::default().instagram_credentials();
        assert!(!credentials.is_present());
    }

    #[test]
    fn test_instagram_config_debug_is_redacted() {
        let config = InstagramConfig {
            session_id: Some("secret-session".into()),
            ..Default::default()
        };
        assert!(!format!("{config:?}").contains("secret-session"));
    }
}
