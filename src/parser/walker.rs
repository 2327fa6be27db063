//! Depth-first traversal of embedded JSON trees
//!
//! Platforms nest the objects we care about at arbitrary depths inside
//! framework payloads. [`walk`] visits every node, collecting the ones a
//! predicate accepts. Children of a matched node are still visited so that
//! shared posts nested inside a post are found too.

use serde_json::Value;

/// Maximum recursion depth; deeper subtrees are skipped
pub const MAX_DEPTH: usize = 128;

/// Typenames of nodes representing a single post
const STORY_TYPENAMES: &[&str] = &["Story", "FeedUnit", "Post", "UserPost"];

/// Collect every node accepted by `predicate`, in document order
pub fn walk<'a, P>(root: &'a Value, predicate: P) -> Vec<&'a Value>
where
    P: Fn(&Value) -> bool,
{
    let mut found = Vec::new();
    visit(root, &predicate, 0, &mut found);
    found
}

fn visit<'a, P>(node: &'a Value, predicate: &P, depth: usize, found: &mut Vec<&'a Value>)
where
    P: Fn(&Value) -> bool,
{
    if depth > MAX_DEPTH {
        return;
    }

    if predicate(node) {
        found.push(node);
    }

    match node {
        Value::Object(map) => {
            for child in map.values() {
                visit(child, predicate, depth + 1, found);
            }
        }
        Value::Array(items) => {
            for child in items {
                visit(child, predicate, depth + 1, found);
            }
        }
        _ => {}
    }
}

/// Whether a node is a post-like object
///
/// A story carries a story typename and at least one of an id or a message.
pub fn is_story_like(node: &Value) -> bool {
    let Some(map) = node.as_object() else {
        return false;
    };

    let typename = map.get("__typename").and_then(Value::as_str);
    if !typename.is_some_and(|t| STORY_TYPENAMES.contains(&t)) {
        return false;
    }

    map.contains_key("id") || map.contains_key("post_id") || map.contains_key("message")
}
