//! Content extraction from fetched pages
//!
//! Structured extraction ([`structured`], [`walker`], [`fields`]) handles
//! embedded JSON payloads; [`html`] handles markup containers and metadata;
//! [`validator`] decides what counts as genuine content; [`page_id`] maps a
//! handle to the platform's numeric id.

pub mod fields;
pub mod html;
pub mod page_id;
pub mod sanitize;
pub mod selectors;
pub mod structured;
pub mod validator;
pub mod walker;

pub use fields::{first_some, resolve_path, FieldCandidates};
pub use html::{parse_meta, MarkupParser, PageMeta};
pub use validator::ContentValidator;
pub use walker::{is_story_like, walk};

use serde_json::Value;

use crate::models::Post;

/// Story nodes found in every structured payload of `html`
///
/// Returns the payload count alongside the stories so callers can tell
/// "no payloads" apart from "payloads without stories".
pub fn find_stories(html: &str) -> (usize, Vec<Value>) {
    let payloads = structured::extract_script_payloads(html, "__typename");
    let stories = payloads
        .iter()
        .flat_map(|payload| walk(payload, is_story_like))
        .cloned()
        .collect();
    (payloads.len(), stories)
}

/// Posts resolved from story nodes, in document order, at most `limit`
pub fn posts_from_stories(
    stories: &[Value],
    validator: &ContentValidator,
    with_comments: bool,
    limit: usize,
) -> Vec<Post> {
    stories
        .iter()
        .filter_map(|story| {
            let mut post = fields::FACEBOOK_STORY.resolve_post(story, validator)?;
            if with_comments {
                let flat = fields::embedded_comments(story);
                post.comments = Some(crate::crawler::comment::build_comment_tree(flat));
            }
            Some(post)
        })
        .take(limit)
        .collect()
}
