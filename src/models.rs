// Core data structures for feedsift

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::parser::validator::ContentValidator;
use crate::utils::{content_hash, normalize_whitespace};

/// Prefix marking ids generated from content rather than taken from the platform
pub const SYNTHETIC_ID_PREFIX: &str = "syn_";

/// Source platform of a scrape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Facebook,
    Instagram,
}

impl Platform {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Facebook => "facebook",
            Self::Instagram => "instagram",
        }
    }
}

/// A single post extracted from a page or profile feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub like_count: u64,
    pub comment_count: u64,
    pub share_count: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub media_urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<Vec<Comment>>,
}

impl Post {
    /// Whether the id was generated from the content hash
    pub fn has_synthetic_id(&self) -> bool {
        self.id.starts_with(SYNTHETIC_ID_PREFIX)
    }
}

/// Generate a content-derived id for posts that carry no platform id
pub fn synthetic_id(content: &str) -> String {
    let hash = content_hash(content);
    format!("{SYNTHETIC_ID_PREFIX}{}", &hash[..16])
}

/// Incrementally filled post record
///
/// Fields are set as they resolve; [`PostBuilder::build`] freezes the record,
/// applying the content validator and the timestamp fallback.
#[derive(Debug, Clone, Default)]
pub struct PostBuilder {
    id: Option<String>,
    content: Option<String>,
    timestamp: Option<DateTime<Utc>>,
    like_count: u64,
    comment_count: u64,
    share_count: u64,
    media_urls: Vec<String>,
    comments: Option<Vec<Comment>>,
}

impl PostBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        if !id.trim().is_empty() {
            self.id = Some(id);
        }
        self
    }

    pub fn content(mut self, content: impl AsRef<str>) -> Self {
        self.content = Some(normalize_whitespace(content.as_ref()));
        self
    }

    pub fn timestamp(mut self, timestamp: Option<DateTime<Utc>>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn like_count(mut self, count: u64) -> Self {
        self.like_count = count;
        self
    }

    pub fn comment_count(mut self, count: u64) -> Self {
        self.comment_count = count;
        self
    }

    pub fn share_count(mut self, count: u64) -> Self {
        self.share_count = count;
        self
    }

    /// Add a media URL, keeping insertion order and skipping duplicates and
    /// non-absolute URLs
    pub fn media_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        let absolute = url.starts_with("https://") || url.starts_with("http://");
        if absolute && !self.media_urls.contains(&url) {
            self.media_urls.push(url);
        }
        self
    }

    pub fn media_urls<I, S>(self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        urls.into_iter().fold(self, |b, u| b.media_url(u))
    }

    pub fn comments(mut self, comments: Vec<Comment>) -> Self {
        self.comments = Some(comments);
        self
    }

    /// Freeze into a [`Post`]
    ///
    /// Returns `None` when the content is missing or rejected by the
    /// validator. A missing id becomes a synthetic one; a missing timestamp
    /// becomes now.
    pub fn build(self, validator: &ContentValidator) -> Option<Post> {
        let content = self.content.filter(|c| validator.is_valid(c))?;
        let id = self.id.unwrap_or_else(|| synthetic_id(&content));

        Some(Post {
            id,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            content,
            like_count: self.like_count,
            comment_count: self.comment_count,
            share_count: self.share_count,
            media_urls: self.media_urls,
            comments: self.comments,
        })
    }
}

/// Page or profile attributes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub about: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follower_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_pic_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_pic_url_hd: Option<String>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// A comment on a post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub author_username: String,
    pub author_display_name: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub like_count: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replies: Vec<Comment>,

    /// Parent comment id while the list is still flat
    #[serde(skip)]
    pub parent_id: Option<String>,
}

impl Comment {
    /// Get total count including nested replies
    pub fn total_count(&self) -> usize {
        1 + self.replies.iter().map(|r| r.total_count()).sum::<usize>()
    }
}

/// Outcome of a single strategy run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "status", content = "detail")]
pub enum StrategyOutcome {
    /// Strategy produced at least one new post
    Succeeded,
    /// Strategy ran but produced nothing usable
    Empty,
    /// Strategy failed (fetch or parse); the reason is kept for diagnostics
    Failed(String),
    /// Strategy was not needed or not applicable
    Skipped,
}

/// Per-strategy diagnostic entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyReport {
    pub name: String,
    pub posts_found: usize,
    pub outcome: StrategyOutcome,
}

/// Aggregate output of one scrape invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeResult {
    pub platform: Platform,
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
    pub posts: Vec<Post>,
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub strategies_tried: Vec<StrategyReport>,
    pub scraped_at: DateTime<Utc>,
}

impl ScrapeResult {
    /// Empty result for the given target
    pub fn new(platform: Platform, identifier: impl Into<String>) -> Self {
        Self {
            platform,
            identifier: identifier.into(),
            resolved_id: None,
            profile: None,
            posts: Vec::new(),
            warnings: Vec::new(),
            error: None,
            strategies_tried: Vec::new(),
            scraped_at: Utc::now(),
        }
    }

    /// Result carrying a fatal error
    pub fn fatal(platform: Platform, identifier: impl Into<String>, error: impl ToString) -> Self {
        let mut result = Self::new(platform, identifier);
        result.error = Some(error.to_string());
        result
    }

    /// A scrape is successful unless it hit a fatal error
    pub fn success(&self) -> bool {
        self.error.is_none()
    }

    pub fn warn(&mut self, warning: impl Into<String>) {
        let warning = warning.into();
        if !self.warnings.contains(&warning) {
            self.warnings.push(warning);
        }
    }
}
