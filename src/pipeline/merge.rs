//! Result merging across strategies
//!
//! Posts arrive strategy by strategy. The merger keeps first-seen order,
//! drops duplicates and stops accepting once the requested count is reached.

use std::collections::{HashMap, HashSet};

use crate::models::Post;
use crate::utils::content_hash;

/// Accumulates posts from successive strategies
#[derive(Debug)]
pub struct ResultMerger {
    posts: Vec<Post>,
    ids: HashSet<String>,
    /// Content hash -> index into `posts`
    hashes: HashMap<String, usize>,
    limit: usize,
}

impl ResultMerger {
    pub fn new(limit: usize) -> Self {
        Self {
            posts: Vec::new(),
            ids: HashSet::new(),
            hashes: HashMap::new(),
            limit,
        }
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    /// Posts still wanted before the limit is reached
    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.posts.len())
    }

    pub fn is_full(&self) -> bool {
        self.remaining() == 0
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    /// Merge `incoming`, returning how many posts were newly accepted
    ///
    /// A post is a duplicate when its id was already seen. Equal content is
    /// also a duplicate when either side carries a synthetic id; in that
    /// case a platform id replaces the synthetic record in place.
    pub fn add(&mut self, incoming: Vec<Post>) -> usize {
        let mut accepted = 0;

        for post in incoming {
            if self.ids.contains(&post.id) {
                continue;
            }

            let hash = content_hash(&post.content);
            if let Some(&index) = self.hashes.get(&hash) {
                let existing = &self.posts[index];
                if existing.has_synthetic_id() && !post.has_synthetic_id() {
                    self.ids.remove(&existing.id);
                    self.ids.insert(post.id.clone());
                    self.posts[index] = post;
                    continue;
                }
                if existing.has_synthetic_id() || post.has_synthetic_id() {
                    continue;
                }
            }

            if self.is_full() {
                break;
            }

            self.ids.insert(post.id.clone());
            self.hashes.entry(hash).or_insert(self.posts.len());
            self.posts.push(post);
            accepted += 1;
        }

        accepted
    }

    pub fn into_posts(self) -> Vec<Post> {
        self.posts
    }
}
