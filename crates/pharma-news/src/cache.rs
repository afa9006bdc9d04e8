//! Author display-name cache.
//!
//! Entries are added on first lookup and never expire. Concurrent lookups of
//! the same uncached author may both hit the API; the cache only saves
//! requests, it does not guarantee a single fetch.

use std::{collections::HashMap, sync::RwLock};

/// Process-lifetime map from author id to display name.
///
/// Share one instance between clients by wrapping it in `Arc`. A poisoned
/// lock behaves like an empty cache.
#[derive(Debug, Default)]
pub struct AuthorCache {
    names: RwLock<HashMap<u64, String>>,
}

impl AuthorCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached display name for an author, if one was recorded.
    pub fn get(&self, author_id: u64) -> Option<String> {
        self.names.read().ok()?.get(&author_id).cloned()
    }

    /// Records a name. An existing entry is kept.
    pub fn insert(&self, author_id: u64, name: String) {
        if let Ok(mut names) = self.names.write() {
            names.entry(author_id).or_insert(name);
        }
    }

    /// Number of cached authors.
    pub fn len(&self) -> usize {
        self.names.read().map(|names| names.len()).unwrap_or(0)
    }

    /// `true` when no author has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
