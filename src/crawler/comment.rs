//! Comment parsing and tree building
//!
//! Facebook embeds comment edges inside story payloads; Instagram serves
//! them from a REST endpoint or the legacy query endpoint. All three shapes
//! are converted into flat [`Comment`] lists carrying parent ids, then
//! nested with [`build_comment_tree`].

use chrono::Utc;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::models::Comment;
use crate::parser::fields::{as_count, as_id, as_text, as_timestamp, resolve_path};
use crate::parser::sanitize::strip_html_tags;

// ============================================================================
// Conversion
// ============================================================================

fn first_path<T>(node: &Value, paths: &[&str], interpret: fn(&Value) -> Option<T>) -> Option<T> {
    paths
        .iter()
        .find_map(|path| resolve_path(node, path).and_then(interpret))
}

/// Username from a profile URL such as `https://www.facebook.com/ana.lopez`
fn username_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let last = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
    (last != "profile.php").then(|| last.to_string())
}

/// Convert a Facebook comment node
///
/// Returns `None` when the node has no id or no text.
pub fn convert_facebook_comment(node: &Value) -> Option<Comment> {
    let id = first_path(node, &["legacy_fbid", "id"], as_id)?;
    let text = first_path(node, &["body.text", "preferred_body.text", "text"], as_text)?;

    let display_name = first_path(node, &["author.name"], as_text).unwrap_or_default();
    let username = first_path(node, &["author.url"], as_text)
        .and_then(|url| username_from_url(&url))
        .or_else(|| first_path(node, &["author.id"], as_id))
        .unwrap_or_else(|| display_name.clone());

    Some(Comment {
        id,
        author_username: username,
        author_display_name: display_name,
        text: clean_comment_content(&text),
        timestamp: first_path(node, &["created_time", "created_at"], as_timestamp)
            .unwrap_or_else(Utc::now),
        like_count: first_path(
            node,
            &["feedback.reactors.count", "reactors.count", "like_count"],
            as_count,
        )
        .unwrap_or(0),
        replies: Vec::new(),
        parent_id: first_path(node, &["comment_parent.id", "parent_comment.id"], as_id),
    })
}

/// Convert an Instagram REST comment, including its preview replies
///
/// The returned list is flat: the comment first, then its replies with
/// `parent_id` set.
pub fn convert_instagram_comment(node: &Value) -> Vec<Comment> {
    let Some(id) = first_path(node, &["pk", "id"], as_id) else {
        return Vec::new();
    };
    let Some(text) = first_path(node, &["text"], as_text) else {
        return Vec::new();
    };

    let username = first_path(node, &["user.username"], as_text).unwrap_or_default();
    let comment = Comment {
        id: id.clone(),
        author_display_name: first_path(node, &["user.full_name"], as_text)
            .unwrap_or_else(|| username.clone()),
        author_username: username,
        text: clean_comment_content(&text),
        timestamp: first_path(node, &["created_at_utc", "created_at"], as_timestamp)
            .unwrap_or_else(Utc::now),
        like_count: first_path(node, &["comment_like_count", "like_count"], as_count).unwrap_or(0),
        replies: Vec::new(),
        parent_id: first_path(node, &["parent_comment_id"], as_id),
    };

    let mut flat = vec![comment];
    if let Some(previews) = node.get("preview_child_comments").and_then(Value::as_array) {
        for reply in previews {
            for mut child in convert_instagram_comment(reply) {
                child.parent_id.get_or_insert_with(|| id.clone());
                flat.push(child);
            }
        }
    }
    flat
}

/// Convert a legacy query comment edge node, including threaded replies
pub fn convert_instagram_edge(node: &Value) -> Vec<Comment> {
    let Some(id) = first_path(node, &["id"], as_id) else {
        return Vec::new();
    };
    let Some(text) = first_path(node, &["text"], as_text) else {
        return Vec::new();
    };

    let username = first_path(node, &["owner.username"], as_text).unwrap_or_default();
    let mut flat = vec![Comment {
        id: id.clone(),
        author_display_name: username.clone(),
        author_username: username,
        text: clean_comment_content(&text),
        timestamp: first_path(node, &["created_at"], as_timestamp).unwrap_or_else(Utc::now),
        like_count: first_path(node, &["edge_liked_by.count"], as_count).unwrap_or(0),
        replies: Vec::new(),
        parent_id: None,
    }];

    if let Some(edges) = resolve_path(node, "edge_threaded_comments.edges").and_then(Value::as_array) {
        for edge in edges {
            if let Some(reply_node) = edge.get("node") {
                for mut child in convert_instagram_edge(reply_node) {
                    child.parent_id.get_or_insert_with(|| id.clone());
                    flat.push(child);
                }
            }
        }
    }
    flat
}

/// Clean comment content
///
/// - Remove HTML tags
/// - Decode HTML entities
/// - Normalize whitespace
fn clean_comment_content(content: &str) -> String {
    let no_tags = strip_html_tags(content);
    let decoded = html_escape::decode_html_entities(&no_tags);
    crate::utils::normalize_whitespace(&decoded)
}

// ============================================================================
// Comment Tree Builder
// ============================================================================

/// Deepest reply nesting kept in a tree
pub const MAX_REPLY_DEPTH: usize = 16;

/// Build a comment tree from a flat list
///
/// Top-level comments keep their input order. Replies are attached to their
/// parent in chronological order; a reply whose parent is missing from the
/// list is promoted to top level. Replies that cannot be reached from a
/// top-level comment (parent cycles, nesting beyond [`MAX_REPLY_DEPTH`]) are
/// appended at top level, oldest first.
pub fn build_comment_tree(comments: Vec<Comment>) -> Vec<Comment> {
    let ids: HashSet<String> = comments.iter().map(|c| c.id.clone()).collect();

    let mut top_level: Vec<Comment> = Vec::new();
    let mut replies_map: HashMap<String, Vec<Comment>> = HashMap::new();
    let mut seen = HashSet::new();

    for comment in comments {
        if !seen.insert(comment.id.clone()) {
            continue;
        }
        match comment.parent_id.clone() {
            Some(parent_id) if ids.contains(&parent_id) && parent_id != comment.id => {
                replies_map.entry(parent_id).or_default().push(comment);
            }
            _ => top_level.push(comment),
        }
    }

    fn attach_replies(
        comment: &mut Comment,
        replies_map: &mut HashMap<String, Vec<Comment>>,
        depth: usize,
    ) {
        if depth >= MAX_REPLY_DEPTH {
            return;
        }
        if let Some(mut replies) = replies_map.remove(&comment.id) {
            for reply in &mut replies {
                attach_replies(reply, replies_map, depth + 1);
            }
            replies.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
            comment.replies = replies;
        }
    }

    for comment in &mut top_level {
        attach_replies(comment, &mut replies_map, 0);
    }

    let mut orphans: Vec<Comment> = replies_map.into_values().flatten().collect();
    if !orphans.is_empty() {
        debug!(count = orphans.len(), "Promoting unreachable replies to top level");
        orphans.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        top_level.extend(orphans);
    }

    top_level
}

/// Keep at most `limit` top-level comments (replies are kept with their parent)
pub fn limit_comments(mut comments: Vec<Comment>, limit: usize) -> Vec<Comment> {
    comments.truncate(limit);
    comments
}
