//! Error types for the feedsift scraper
//!
//! This module defines the layer-specific error types used throughout the
//! fetch, parse and scrape stages.

use thiserror::Error;

/// Errors that can occur during HTTP fetching operations
#[derive(Error, Debug)]
pub enum FetchError {
    /// Request did not complete within the hard timeout
    #[error("Request timeout after {0} ms")]
    Timeout(u64),

    /// DNS or connection-level failure
    #[error("Network error: {0}")]
    Network(String),

    /// Upstream signalled rate limiting (429 or login-shaped 400) and retries ran out
    #[error("Rate limited after {attempts} attempts")]
    RateLimited { attempts: u32 },

    /// Upstream redirected to a login wall
    #[error("Login required (redirected to {location})")]
    LoginRequired { location: String },

    /// Upstream kept redirecting back to the requested URL
    #[error("Redirect loop detected for {0}")]
    RedirectLoop(String),

    /// Ordinary non-success status
    #[error("Unexpected status: {0}")]
    Status(u16),

    /// Content decoding error
    #[error("Decoding error: {0}")]
    Decode(String),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// HTTP client could not be constructed
    #[error("Client build failed: {0}")]
    ClientBuild(String),
}

impl FetchError {
    /// Whether a retry of the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Network(_))
    }

    /// Whether the failure means the target is behind a login wall
    pub fn is_login_wall(&self) -> bool {
        matches!(self, Self::LoginRequired { .. })
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(0)
        } else if err.is_builder() {
            Self::ClientBuild(err.to_string())
        } else if err.is_decode() || err.is_body() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Errors that can occur during parsing operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A structured-data boundary was found but did not parse
    #[error("Structured data did not parse: {0}")]
    Malformed(String),

    /// Data parsed but lacked the expected fields
    #[error("Missing expected field: {0}")]
    MissingField(String),

    /// Every strategy was exhausted without a qualifying result
    #[error("No data found")]
    NoDataFound,
}

/// Errors that abort or classify a whole scrape
#[derive(Error, Debug)]
pub enum ScrapeError {
    /// Fetch error
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Session-authenticated platform used without credentials
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    /// Login wall on the identifier-resolution request
    #[error("Login required to access {0}")]
    LoginRequired(String),

    /// Identifier could not be normalized into anything usable
    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(FetchError::RateLimited { attempts: 4 }.is_retryable());
        assert!(FetchError::Network("reset".into()).is_retryable());
        assert!(!FetchError::Timeout(30_000).is_retryable());
        assert!(!FetchError::LoginRequired {
            location: "/login".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_login_wall_detection() {
        let err = FetchError::LoginRequired {
            location: "https://www.facebook.com/login/".into(),
        };
        assert!(err.is_login_wall());
        assert!(err.to_string().contains("/login/"));
    }

    #[test]
    fn test_scrape_error_conversion() {
        let err: ScrapeError = FetchError::Status(404).into();
        assert!(matches!(err, ScrapeError::Fetch(FetchError::Status(404))));
    }
}
