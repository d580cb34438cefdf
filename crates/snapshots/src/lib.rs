//! Content-addressed snapshot storage
//!
//! Every source unit text that has ever been committed is retained under its
//! content hash, so a later revision can diff the old source against the new
//! one. Entries are immutable and never deleted.

pub mod memory;
pub mod record;
pub mod sled_store;

pub use memory::MemorySnapshotStore;
pub use sled_store::SledSnapshotStore;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tandem_core::ContentHash;
use thiserror::Error;

/// Snapshot storage errors
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("database error: {0}")]
    Database(#[from] sled::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid snapshot record: {0}")]
    InvalidRecord(String),

    #[error("snapshot {hash} is corrupt: stored text hashes to {actual}")]
    Corrupt {
        hash: ContentHash,
        actual: ContentHash,
    },
}

pub type Result<T> = std::result::Result<T, SnapshotError>;

/// Content-addressed, insert-if-absent text store
pub trait SnapshotStore: Send + Sync {
    /// Store `content` under its hash. Idempotent: storing the same text
    /// again is a no-op that returns the same hash.
    fn put(&self, content: &str) -> Result<ContentHash>;

    /// Fetch the text stored under `hash`
    fn get(&self, hash: &ContentHash) -> Result<Option<String>>;

    fn contains(&self, hash: &ContentHash) -> Result<bool> {
        Ok(self.get(hash)?.is_some())
    }
}

impl<S: SnapshotStore + ?Sized> SnapshotStore for Arc<S> {
    fn put(&self, content: &str) -> Result<ContentHash> {
        (**self).put(content)
    }

    fn get(&self, hash: &ContentHash) -> Result<Option<String>> {
        (**self).get(hash)
    }

    fn contains(&self, hash: &ContentHash) -> Result<bool> {
        (**self).contains(hash)
    }
}

/// Tuning for the durable store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Bodies at least this many bytes long are zstd-compressed
    pub compress_threshold: usize,
    /// zstd level (1-22)
    pub compression_level: i32,
    /// Flush the database after every new entry
    pub flush_on_write: bool,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            compress_threshold: 4096,
            compression_level: 3,
            flush_on_write: true,
        }
    }
}
