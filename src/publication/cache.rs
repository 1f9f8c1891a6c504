//! Content cache and fragment map

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Raw content already retrieved for a publication, keyed by normalized path
/// (no leading separator). Read-only while a load cycle runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceCache {
    entries: HashMap<String, String>,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, content: impl Into<String>) {
        self.entries.insert(path.into(), content.into());
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ResourceCache {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Resolved fragments of one aggregation pass, keyed by entry id
#[derive(Debug, Clone, Default)]
pub struct FragmentMap {
    fragments: HashMap<String, String>,
}

impl FragmentMap {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fragments: HashMap::with_capacity(capacity),
        }
    }

    /// Store a fragment. Returns `false` and leaves the map untouched if the
    /// id was already written.
    pub fn insert(&mut self, id: String, content: String) -> bool {
        if self.fragments.contains_key(&id) {
            return false;
        }
        self.fragments.insert(id, content);
        true
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.fragments.get(id).map(String::as_str)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.fragments.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}
