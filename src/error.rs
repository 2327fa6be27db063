//! Unified error handling for the feedsift crate
//!
//! This module provides a unified error type that consolidates the
//! layer-specific errors into a single `Error` enum, while keeping the
//! layer errors available where finer handling is needed.
//!
//! # Architecture
//!
//! - [`FeedsiftErrorTrait`] - Common interface implemented by all error types
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum wrapping all layer errors
//!
//! # Usage
//!
//! ```rust,ignore
//! use feedsift::error::{Error, FeedsiftErrorTrait};
//!
//! fn handle_error(err: Error) {
//!     if err.is_recoverable() {
//!         println!("Trying next strategy: {err}");
//!     } else {
//!         eprintln!("Fatal error: {err}");
//!     }
//! }
//! ```

use thiserror::Error;

pub use crate::utils::error::{FetchError, ParseError, ScrapeError};

/// Common trait for all feedsift error types
pub trait FeedsiftErrorTrait: std::error::Error {
    /// Check if this error is recoverable (the pipeline may move on)
    fn is_recoverable(&self) -> bool;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Network-related errors (HTTP, timeout, rate limit)
    Network,
    /// Parsing and data extraction errors
    Parsing,
    /// Login walls and missing credentials
    Auth,
    /// Configuration and validation errors
    Config,
}

impl ErrorCategory {
    /// Short lowercase label used in warnings and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Parsing => "parsing",
            Self::Auth => "auth",
            Self::Config => "config",
        }
    }
}

impl FeedsiftErrorTrait for FetchError {
    fn is_recoverable(&self) -> bool {
        !matches!(self, Self::LoginRequired { .. } | Self::ClientBuild(_))
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::LoginRequired { .. } => ErrorCategory::Auth,
            Self::Decode(_) => ErrorCategory::Parsing,
            Self::InvalidUrl(_) | Self::ClientBuild(_) => ErrorCategory::Config,
            _ => ErrorCategory::Network,
        }
    }
}

impl FeedsiftErrorTrait for ParseError {
    fn is_recoverable(&self) -> bool {
        true
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Parsing
    }
}

impl FeedsiftErrorTrait for ScrapeError {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_recoverable(),
            Self::Parse(e) => e.is_recoverable(),
            Self::MissingCredentials(_) | Self::LoginRequired(_) | Self::InvalidIdentifier(_) => {
                false
            }
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Fetch(e) => e.category(),
            Self::Parse(e) => e.category(),
            Self::MissingCredentials(_) | Self::LoginRequired(_) => ErrorCategory::Auth,
            Self::InvalidIdentifier(_) => ErrorCategory::Config,
        }
    }
}

/// Unified error type for the feedsift crate
#[derive(Error, Debug)]
pub enum Error {
    /// Scrape-level errors
    #[error("Scrape error: {0}")]
    Scrape(#[from] ScrapeError),

    /// Fetch-specific errors
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Parse-specific errors
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),
}

impl FeedsiftErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Scrape(e) => e.is_recoverable(),
            Self::Fetch(e) => e.is_recoverable(),
            Self::Parse(e) => e.is_recoverable(),
            Self::Config(_) => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Scrape(e) => e.category(),
            Self::Fetch(e) => e.category(),
            Self::Parse(e) => e.category(),
            Self::Config(_) => ErrorCategory::Config,
        }
    }
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
