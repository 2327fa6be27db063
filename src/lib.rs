//! feedsift - Best-effort social page scraper
//!
//! Extracts posts, comments and profile data from public Facebook pages and
//! Instagram profiles by running an ordered set of extraction strategies and
//! merging whatever they find.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`crawler`] - Resilient HTTP client, browser headers and URL building
//! - [`parser`] - Structured-payload and markup extraction, content validation
//! - [`pipeline`] - Strategy orchestration for each platform
//! - [`models`] - Core data structures and types
//! - [`error`] - Unified error handling
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use feedsift::crawler::ResilientHttpClient;
//! use feedsift::pipeline::{FacebookScraper, ScrapeOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = Arc::new(ResilientHttpClient::new(2)?);
//!     let scraper = FacebookScraper::new(client);
//!     let result = scraper.scrape("example-cafe", &ScrapeOptions::default()).await;
//!     println!("{}", serde_json::to_string_pretty(&result)?);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod crawler;
pub mod error;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::crawler::{FetchOptions, PageSource, ResilientHttpClient};
    pub use crate::error::{Error, ErrorCategory, FeedsiftErrorTrait, Result};
    pub use crate::models::{Comment, Platform, Post, Profile, ScrapeResult};
    pub use crate::parser::ContentValidator;
    pub use crate::pipeline::{FacebookScraper, InstagramCredentials, ScrapeOptions, SessionFeedClient};
}

// Direct re-exports for convenience
pub use models::{Platform, Post, ScrapeResult};
