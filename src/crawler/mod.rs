//! Network side of the scraper
//!
//! Everything that talks HTTP or shapes requests lives here: the resilient
//! client and its sticky egress table, browser identity headers, endpoint
//! URL construction, and conversion of raw comment payloads.

pub mod comment;
pub mod fetcher;
pub mod headers;
pub mod sticky;
pub mod url;

pub use fetcher::{FetchOptions, FetchedPage, PageSource, RedirectMode, ResilientHttpClient};
pub use headers::BrowserProfile;
pub use sticky::StickyRoutes;
pub use url::{normalize_identifier, FacebookUrls, InstagramUrls};
