//! Field resolution over loosely-typed JSON nodes
//!
//! The same logical field (a post's text, its like count) lives under
//! different paths depending on the payload generation and surface. Each
//! logical field has an ordered list of candidate paths; the first one that
//! resolves to a present, well-typed value wins.
//!
//! Paths are dotted (`feedback.reaction_count.count`). A numeric segment
//! indexes an array and `*` fans out over every element.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

use crate::models::{Comment, Post, PostBuilder};
use crate::parser::validator::ContentValidator;

/// Epoch values above this are milliseconds rather than seconds
const MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// Evaluate candidates in order and return the first hit
///
/// Shared by every cascading lookup: path lists here, identifier patterns in
/// [`crate::parser::page_id`].
pub fn first_some<A, T, F>(candidates: &[F], input: A) -> Option<T>
where
    A: Copy,
    F: Fn(A) -> Option<T>,
{
    candidates.iter().find_map(|candidate| candidate(input))
}

/// Resolve a dotted path to a single non-null value
pub fn resolve_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    (!current.is_null()).then_some(current)
}

/// Resolve a dotted path that may contain `*` wildcards
pub fn resolve_all<'a>(value: &'a Value, path: &str) -> Vec<&'a Value> {
    let mut frontier = vec![value];
    for segment in path.split('.') {
        let mut next = Vec::new();
        for node in frontier {
            match (node, segment) {
                (Value::Array(items), "*") => next.extend(items.iter()),
                (Value::Object(map), "*") => next.extend(map.values()),
                (Value::Object(map), key) => next.extend(map.get(key)),
                (Value::Array(items), index) => {
                    if let Ok(i) = index.parse::<usize>() {
                        next.extend(items.get(i));
                    }
                }
                _ => {}
            }
        }
        frontier = next;
    }
    frontier.retain(|v| !v.is_null());
    frontier
}

/// Interpret a value as text: a non-empty string, or an object with a
/// `text` member
pub fn as_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.as_str(),
        Value::Object(map) => map.get("text")?.as_str()?,
        _ => return None,
    };
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Interpret a value as an identifier: a string or an integer
pub fn as_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => n.as_u64().map(|n| n.to_string()),
        _ => None,
    }
}

/// Interpret a value as a non-negative count
///
/// Accepts integers, non-negative floats and display strings such as
/// `"1,234"`, `"1.2K"` or `"3M"`.
pub fn as_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => parse_count(s),
        Value::Object(map) => map.get("count").and_then(as_count),
        _ => None,
    }
}

/// Parse a human-formatted count
pub fn parse_count(text: &str) -> Option<u64> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | ' ' | '\u{a0}' | '_'))
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let (number, multiplier) = match cleaned.chars().last()?.to_ascii_uppercase() {
        'K' => (&cleaned[..cleaned.len() - 1], 1_000.0),
        'M' => (&cleaned[..cleaned.len() - 1], 1_000_000.0),
        'B' => (&cleaned[..cleaned.len() - 1], 1_000_000_000.0),
        _ => (cleaned.as_str(), 1.0),
    };

    if multiplier == 1.0 {
        return number.parse::<u64>().ok();
    }

    let value: f64 = number.parse().ok()?;
    (value >= 0.0).then(|| (value * multiplier).round() as u64)
}

/// Interpret a value as an instant
///
/// Accepts epoch seconds or milliseconds (numbers or digit strings),
/// RFC 3339 strings and `+0000`-style offsets.
pub fn as_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_i64().and_then(epoch_to_datetime),
        Value::String(s) => parse_timestamp(s),
        _ => None,
    }
}

fn epoch_to_datetime(epoch: i64) -> Option<DateTime<Utc>> {
    if epoch <= 0 {
        return None;
    }
    if epoch >= MILLIS_THRESHOLD {
        Utc.timestamp_millis_opt(epoch).single()
    } else {
        Utc.timestamp_opt(epoch, 0).single()
    }
}

/// Parse a timestamp string
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()) {
        return epoch_to_datetime(text.parse().ok()?);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%z") {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Ordered candidate paths for every logical field of a post
#[derive(Debug, Clone, Copy)]
pub struct FieldCandidates {
    pub id: &'static [&'static str],
    pub message: &'static [&'static str],
    /// Consulted when no message path resolves
    pub attachment_text: &'static [&'static str],
    pub like_count: &'static [&'static str],
    pub comment_count: &'static [&'static str],
    pub share_count: &'static [&'static str],
    pub timestamp: &'static [&'static str],
    /// Wildcard paths; every hit is collected in order
    pub media: &'static [&'static str],
}

/// Facebook story nodes from embedded framework payloads
pub const FACEBOOK_STORY: FieldCandidates = FieldCandidates {
    id: &["post_id", "legacy_story_hideable_id", "id"],
    message: &[
        "message.text",
        "comet_sections.content.story.message.text",
        "comet_sections.content.story.comet_sections.message.story.message.text",
        "message",
        "body.text",
        "text",
    ],
    attachment_text: &[
        "attachments.0.title_with_entities.text",
        "attachments.0.media.title.text",
        "attachments.0.description.text",
        "attachments.0.styles.attachment.title_with_entities.text",
    ],
    like_count: &[
        "feedback.reaction_count.count",
        "feedback.reactors.count",
        "comet_sections.feedback.story.feedback_context.feedback_target_with_context.ufi_renderer.feedback.comet_ufi_summary_and_actions_renderer.feedback.reaction_count.count",
        "reaction_count.count",
        "reaction_count",
        "like_count",
        "likes.count",
    ],
    comment_count: &[
        "feedback.comment_count.total_count",
        "feedback.comments.total_count",
        "feedback.total_comment_count",
        "comment_count.total_count",
        "comment_count",
        "comments.count",
    ],
    share_count: &[
        "feedback.share_count.count",
        "share_count.count",
        "share_count",
        "shares.count",
    ],
    timestamp: &[
        "creation_time",
        "created_time",
        "publish_time",
        "comet_sections.context_layout.story.comet_sections.metadata.0.story.creation_time",
        "timestamp",
    ],
    media: &[
        "attachments.*.media.image.uri",
        "attachments.*.media.photo_image.uri",
        "attachments.*.all_subattachments.nodes.*.media.image.uri",
        "attachments.*.styles.attachment.media.photo_image.uri",
        "full_picture",
        "image.uri",
    ],
};

/// Instagram REST feed items (`/api/v1/feed/user/...`)
pub const INSTAGRAM_ITEM: FieldCandidates = FieldCandidates {
    id: &["pk", "id", "code"],
    message: &["caption.text", "caption"],
    attachment_text: &["accessibility_caption"],
    like_count: &["like_count", "fb_like_count"],
    comment_count: &["comment_count"],
    share_count: &["reshare_count", "share_count"],
    timestamp: &["taken_at", "caption.created_at", "device_timestamp"],
    media: &[
        "image_versions2.candidates.0.url",
        "carousel_media.*.image_versions2.candidates.0.url",
        "video_versions.0.url",
    ],
};

/// Instagram timeline edges embedded in profile responses
pub const INSTAGRAM_EDGE: FieldCandidates = FieldCandidates {
    id: &["id", "shortcode"],
    message: &["edge_media_to_caption.edges.0.node.text"],
    attachment_text: &["accessibility_caption"],
    like_count: &["edge_liked_by.count", "edge_media_preview_like.count"],
    comment_count: &["edge_media_to_comment.count"],
    share_count: &[],
    timestamp: &["taken_at_timestamp"],
    media: &[
        "display_url",
        "edge_sidecar_to_children.edges.*.node.display_url",
        "video_url",
    ],
};

impl FieldCandidates {
    fn first<T>(&self, node: &Value, paths: &[&str], interpret: fn(&Value) -> Option<T>) -> Option<T> {
        paths
            .iter()
            .find_map(|path| resolve_path(node, path).and_then(interpret))
    }

    /// Post text, falling back to the attachment title or description
    pub fn message(&self, node: &Value) -> Option<String> {
        self.first(node, self.message, as_text)
            .or_else(|| self.first(node, self.attachment_text, as_text))
    }

    pub fn id(&self, node: &Value) -> Option<String> {
        self.first(node, self.id, as_id)
    }

    pub fn timestamp(&self, node: &Value) -> Option<DateTime<Utc>> {
        self.first(node, self.timestamp, as_timestamp)
    }

    pub fn media(&self, node: &Value) -> Vec<String> {
        self.media
            .iter()
            .flat_map(|path| resolve_all(node, path))
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect()
    }

    /// Fill a builder from `node`; counts default to zero
    pub fn builder(&self, node: &Value) -> PostBuilder {
        let mut builder = PostBuilder::new()
            .timestamp(self.timestamp(node))
            .like_count(self.first(node, self.like_count, as_count).unwrap_or(0))
            .comment_count(self.first(node, self.comment_count, as_count).unwrap_or(0))
            .share_count(self.first(node, self.share_count, as_count).unwrap_or(0))
            .media_urls(self.media(node));

        if let Some(id) = self.id(node) {
            builder = builder.id(id);
        }
        if let Some(message) = self.message(node) {
            builder = builder.content(message);
        }
        builder
    }

    /// Resolve and validate a post from `node`
    pub fn resolve_post(&self, node: &Value, validator: &ContentValidator) -> Option<Post> {
        self.builder(node).build(validator)
    }
}

/// Paths holding embedded comment edges on Facebook stories
const EMBEDDED_COMMENT_PATHS: &[&str] = &[
    "feedback.display_comments.edges",
    "comet_sections.feedback.story.feedback_context.interesting_top_level_comments",
    "feedback.comments.edges",
];

/// Flat list of comments embedded in a story node, replies carrying a parent id
pub fn embedded_comments(node: &Value) -> Vec<Comment> {
    let Some(edges) = EMBEDDED_COMMENT_PATHS
        .iter()
        .find_map(|path| resolve_path(node, path).and_then(Value::as_array))
    else {
        return Vec::new();
    };

    edges
        .iter()
        .filter_map(|edge| {
            let comment = edge
                .get("node")
                .or_else(|| edge.get("comment"))
                .unwrap_or(edge);
            crate::crawler::comment::convert_facebook_comment(comment)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn double(n: i32) -> Option<i32> {
        (n > 2).then_some(n * 2)
    }

    fn never(_: i32) -> Option<i32> {
        None
    }

    #[test]
    fn test_first_some_order() {
        let candidates: [fn(i32) -> Option<i32>; 2] = [never, double];
        assert_eq!(first_some(&candidates, 3), Some(6));
        assert_eq!(first_some(&candidates, 1), None);
    }

    #[test]
    fn test_resolve_path() {
        let v = json!({"a": {"b": [{"c": 1}, {"c": null}]}});
        assert_eq!(resolve_path(&v, "a.b.0.c"), Some(&json!(1)));
        assert_eq!(resolve_path(&v, "a.b.1.c"), None);
        assert_eq!(resolve_path(&v, "a.b.5.c"), None);
        assert_eq!(resolve_path(&v, "a.x"), None);
    }

    #[test]
    fn test_resolve_all_wildcard() {
        let v = json!({"items": [{"u": "a"}, {"u": "b"}, {"x": 1}]});
        let hits: Vec<&str> = resolve_all(&v, "items.*.u")
            .into_iter()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(hits, vec!["a", "b"]);
    }

    #[test]
    fn test_count_parsing() {
        assert_eq!(as_count(&json!(42)), Some(42));
        assert_eq!(as_count(&json!(-3)), None);
        assert_eq!(as_count(&json!("1,234")), Some(1234));
        assert_eq!(as_count(&json!("1.2K")), Some(1200));
        assert_eq!(as_count(&json!("3M")), Some(3_000_000));
        assert_eq!(as_count(&json!({"count": 7})), Some(7));
        assert_eq!(as_count(&json!("many")), None);
        assert_eq!(as_count(&json!(true)), None);
    }

    #[test]
    fn test_timestamp_parsing() {
        let secs = as_timestamp(&json!(1_700_000_000)).unwrap();
        let millis = as_timestamp(&json!(1_700_000_000_000i64)).unwrap();
        assert_eq!(secs, millis);
        assert_eq!(as_timestamp(&json!("1700000000")), Some(secs));
        assert!(as_timestamp(&json!("2024-03-01T10:00:00+0000")).is_some());
        assert!(as_timestamp(&json!("2024-03-01T10:00:00Z")).is_some());
        assert!(as_timestamp(&json!(0)).is_none());
        assert!(as_timestamp(&json!("yesterday")).is_none());
    }

    #[test]
    fn test_facebook_story_resolution() {
        let node = json!({
            "__typename": "Story",
            "post_id": "1234567890",
            "message": {"text": "Great coffee, friendly staff, highly recommend!"},
            "creation_time": 1_700_000_000,
            "feedback": {
                "reaction_count": {"count": 42},
                "comment_count": {"total_count": "1.2K"}
            },
            "attachments": [{"media": {"image": {"uri": "https://scontent.example.com/1.jpg"}}}]
        });

        let post = FACEBOOK_STORY
            .resolve_post(&node, &ContentValidator::new())
            .unwrap();
        assert_eq!(post.id, "1234567890");
        assert_eq!(post.like_count, 42);
        assert_eq!(post.comment_count, 1200);
        assert_eq!(post.share_count, 0);
        assert_eq!(post.media_urls, vec!["https://scontent.example.com/1.jpg"]);
    }

    #[test]
    fn test_message_falls_back_to_attachment() {
        let node = json!({
            "__typename": "Story",
            "id": "9",
            "attachments": [{"title_with_entities": {"text": "Our new autumn menu is finally here for everyone"}}]
        });
        assert_eq!(
            FACEBOOK_STORY.message(&node).as_deref(),
            Some("Our new autumn menu is finally here for everyone")
        );
    }

    #[test]
    fn test_invalid_message_yields_no_post() {
        let node = json!({"__typename": "Story", "id": "9", "message": {"text": "Mozilla/5.0 (X11; Linux x86_64)"}});
        assert!(FACEBOOK_STORY
            .resolve_post(&node, &ContentValidator::new())
            .is_none());
    }

    #[test]
    fn test_instagram_item_resolution() {
        let item = json!({
            "pk": 3_141_592_653u64,
            "caption": {"text": "Fresh croissants every morning at our bakery"},
            "like_count": 120,
            "comment_count": 4,
            "taken_at": 1_700_000_000,
            "carousel_media": [
                {"image_versions2": {"candidates": [{"url": "https://cdn.example.com/a.jpg"}]}},
                {"image_versions2": {"candidates": [{"url": "https://cdn.example.com/b.jpg"}]}}
            ]
        });

        let post = INSTAGRAM_ITEM
            .resolve_post(&item, &ContentValidator::new())
            .unwrap();
        assert_eq!(post.id, "3141592653");
        assert_eq!(post.like_count, 120);
        assert_eq!(post.media_urls.len(), 2);
    }

    #[test]
    fn test_embedded_comments() {
        let node = json!({
            "feedback": {"display_comments": {"edges": [
                {"node": {"id": "c1", "body": {"text": "Love this place"},
                    "author": {"name": "Ana Lopez", "id": "100"}, "created_time": 1_700_000_100}},
                {"node": {"id": "c2", "body": {"text": "Me too"},
                    "author": {"name": "Ben"}, "comment_parent": {"id": "c1"}}}
            ]}}
        });

        let comments = embedded_comments(&node);
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].author_display_name, "Ana Lopez");
        assert_eq!(comments[1].parent_id.as_deref(), Some("c1"));
    }
}
