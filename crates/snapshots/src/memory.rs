//! Process-lifetime snapshot store

use crate::{Result, SnapshotStore};
use dashmap::DashMap;
use std::sync::Arc;
use tandem_core::{hash_text, ContentHash};

/// In-memory store backed by a concurrent map
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    entries: DashMap<ContentHash, Arc<str>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn put(&self, content: &str) -> Result<ContentHash> {
        let hash = hash_text(content);
        self.entries
            .entry(hash)
            .or_insert_with(|| Arc::from(content));
        Ok(hash)
    }

    fn get(&self, hash: &ContentHash) -> Result<Option<String>> {
        Ok(self.entries.get(hash).map(|text| text.to_string()))
    }

    fn contains(&self, hash: &ContentHash) -> Result<bool> {
        Ok(self.entries.contains_key(hash))
    }
}
