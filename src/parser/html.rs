//! Markup-level extraction
//!
//! The unstructured half of the pipeline: post containers found with CSS
//! selectors, message text recovered with JSON-shaped patterns when the
//! surrounding payload does not parse, and page metadata from `<meta>` tags.

use chrono::{TimeZone, Utc};
use regex::Regex;
use scraper::{ElementRef, Html, Node};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::models::{Post, PostBuilder, Profile};
use crate::parser::fields::parse_count;
use crate::parser::sanitize::sanitize_text;
use crate::parser::selectors::{MetaSelectors, NoiseSelectors, SurfaceSelectors};
use crate::parser::validator::ContentValidator;
use crate::utils::content_hash;

static REACTIONS_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d[\d,.]*\s?[KMB]?)\s+(?:reactions?|likes?)\b").unwrap()
});

static COMMENTS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d[\d,.]*\s?[KMB]?)\s+comments?\b").unwrap());

static SHARES_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d[\d,.]*\s?[KMB]?)\s+shares?\b").unwrap());

static JSON_MESSAGE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""(?:message|body)"\s*:\s*\{\s*"text"\s*:\s*"((?:[^"\\]|\\.)*)""#).unwrap()
});

static FOLLOWERS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d[\d,.]*\s?[KMB]?)\s+(?:followers|likes)").unwrap());

/// Document metadata from `<meta>` and `<title>`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageMeta {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub url: Option<String>,
}

/// Read the page's Open Graph metadata
pub fn parse_meta(html: &str) -> PageMeta {
    let document = Html::parse_document(html);
    let selectors = MetaSelectors::new();

    let content = |selector: &scraper::Selector| {
        document
            .select(selector)
            .filter_map(|el| el.value().attr("content"))
            .map(sanitize_text)
            .find(|s| !s.is_empty())
    };

    PageMeta {
        title: content(selectors.og_title).or_else(|| {
            document
                .select(selectors.title)
                .map(|el| sanitize_text(&el.text().collect::<String>()))
                .find(|s| !s.is_empty())
        }),
        description: content(selectors.og_description).or_else(|| content(selectors.description)),
        image: content(selectors.og_image),
        url: content(selectors.og_url),
    }
}

/// Build a profile from page metadata
pub fn profile_from_meta(meta: &PageMeta, handle: &str, id: Option<&str>) -> Profile {
    let name = meta
        .title
        .as_deref()
        .map(|t| t.trim_end_matches(" | Facebook").trim_end_matches(" - Home").to_string())
        .unwrap_or_else(|| handle.to_string());

    Profile {
        id: id.unwrap_or(handle).to_string(),
        name,
        username: handle.to_string(),
        follower_count: meta
            .description
            .as_deref()
            .and_then(|d| FOLLOWERS_REGEX.captures(d))
            .and_then(|c| parse_count(&c[1])),
        about: meta.description.clone(),
        profile_pic_url: meta.image.clone(),
        ..Default::default()
    }
}

/// Post extraction from markup containers
pub struct MarkupParser {
    noise: NoiseSelectors,
}

impl MarkupParser {
    #[must_use]
    pub fn new() -> Self {
        Self {
            noise: NoiseSelectors::new(),
        }
    }

    /// Posts found in the containers of `surface`, at most `limit`
    pub fn parse_posts(
        &self,
        html: &str,
        surface: &SurfaceSelectors,
        validator: &ContentValidator,
        limit: usize,
    ) -> Vec<Post> {
        let document = Html::parse_document(html);
        let mut seen = HashSet::new();
        let mut posts = Vec::new();

        for container_selector in surface.container {
            for container in document.select(container_selector) {
                if posts.len() >= limit {
                    return posts;
                }
                let Some(post) = self.parse_container(container, surface, validator) else {
                    continue;
                };
                if seen.insert(content_hash(&post.content)) {
                    posts.push(post);
                }
            }
            if !posts.is_empty() {
                break;
            }
        }

        posts
    }

    fn parse_container(
        &self,
        container: ElementRef,
        surface: &SurfaceSelectors,
        validator: &ContentValidator,
    ) -> Option<Post> {
        let full_text = self.visible_text(container);

        let message = surface
            .text
            .iter()
            .flat_map(|selector| container.select(selector))
            .map(|el| self.visible_text(el))
            .find(|text| validator.is_valid(text))
            .or_else(|| validator.is_valid(&full_text).then(|| full_text.clone()))?;

        let timestamp = surface
            .time
            .iter()
            .flat_map(|selector| container.select(selector))
            .find_map(|el| el.value().attr("data-utime"))
            .and_then(|t| t.parse::<i64>().ok())
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single());

        let count = |re: &Regex| {
            re.captures(&full_text)
                .and_then(|c| parse_count(&c[1]))
                .unwrap_or(0)
        };

        let mut builder = PostBuilder::new()
            .content(&message)
            .timestamp(timestamp)
            .like_count(count(&REACTIONS_REGEX))
            .comment_count(count(&COMMENTS_REGEX))
            .share_count(count(&SHARES_REGEX))
            .media_urls(
                container
                    .select(surface.image)
                    .filter_map(|img| img.value().attr("src"))
                    .filter(|src| !src.contains("emoji") && !src.contains("/rsrc.php"))
                    .map(str::to_string),
            );

        if let Some(id) = container_post_id(container) {
            builder = builder.id(id);
        }

        builder.build(validator)
    }

    /// Sanitized text of `element`, skipping noise subtrees
    fn visible_text(&self, element: ElementRef) -> String {
        let mut text = String::new();
        for node in element.descendants() {
            let Node::Text(chunk) = node.value() else {
                continue;
            };
            let in_noise = node.ancestors().filter_map(ElementRef::wrap).any(|ancestor| {
                self.noise.elements.iter().any(|s| s.matches(&ancestor))
            });
            if !in_noise {
                text.push_str(chunk);
                text.push(' ');
            }
        }
        sanitize_text(&text)
    }
}

impl Default for MarkupParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Post id carried in a mobile container's `data-ft` attribute
fn container_post_id(container: ElementRef) -> Option<String> {
    let data_ft = container.value().attr("data-ft")?;
    let value: Value = serde_json::from_str(data_ft).ok()?;
    ["top_level_post_id", "mf_story_key", "tl_objid"]
        .iter()
        .find_map(|key| match value.get(*key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

/// Message texts recovered from `"message":{"text":"..."}` shapes in raw
/// markup, for payloads that do not parse as a whole
pub fn parse_json_text_patterns(html: &str, validator: &ContentValidator, limit: usize) -> Vec<Post> {
    let mut seen = HashSet::new();

    JSON_MESSAGE_REGEX
        .captures_iter(html)
        .filter_map(|c| {
            let literal = format!("\"{}\"", &c[1]);
            serde_json::from_str::<String>(&literal).ok()
        })
        .filter_map(|text| PostBuilder::new().content(sanitize_text(&text)).build(validator))
        .filter(|post| seen.insert(post.id.clone()))
        .take(limit)
        .collect()
}
