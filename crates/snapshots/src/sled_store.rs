//! Durable snapshot store using sled

use crate::record::{decode_record, encode_record};
use crate::{Result, SnapshotConfig, SnapshotError, SnapshotStore};
use sled::Db;
use std::path::Path;
use tandem_core::{hash_text, ContentHash};
use tracing::{debug, warn};

/// Durable, content-addressed snapshot store
///
/// Keys are the 32 raw hash bytes; values are framed records (see
/// [`crate::record`]). Entries are write-once.
pub struct SledSnapshotStore {
    db: Db,
    config: SnapshotConfig,
}

impl SledSnapshotStore {
    /// Open or create a store under the given directory
    pub fn open(path: &Path, config: SnapshotConfig) -> Result<Self> {
        let db = sled::open(path.join("snapshots.db"))?;
        debug!(path = %path.display(), entries = db.len(), "opened snapshot store");
        Ok(Self { db, config })
    }

    /// Number of stored snapshots
    pub fn len(&self) -> usize {
        self.db.len()
    }

    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }

    /// Flush pending writes to disk
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl SnapshotStore for SledSnapshotStore {
    fn put(&self, content: &str) -> Result<ContentHash> {
        let hash = hash_text(content);
        let key = hash.as_bytes();

        if self.db.contains_key(key)? {
            return Ok(hash);
        }

        let record = encode_record(
            content,
            self.config.compress_threshold,
            self.config.compression_level,
        )?;

        // Lost race with a concurrent writer of the same text: that entry wins.
        if self
            .db
            .compare_and_swap(key, None::<&[u8]>, Some(record))?
            .is_ok()
        {
            debug!(hash = %hash.short(), bytes = content.len(), "stored snapshot");
            if self.config.flush_on_write {
                self.db.flush()?;
            }
        }

        Ok(hash)
    }

    fn get(&self, hash: &ContentHash) -> Result<Option<String>> {
        let value = match self.db.get(hash.as_bytes())? {
            Some(v) => v,
            None => return Ok(None),
        };

        let text = decode_record(&value)?;
        let actual = hash_text(&text);
        if actual != *hash {
            warn!(hash = %hash.short(), actual = %actual.short(), "snapshot failed verification");
            return Err(SnapshotError::Corrupt {
                hash: *hash,
                actual,
            });
        }
        Ok(Some(text))
    }

    fn contains(&self, hash: &ContentHash) -> Result<bool> {
        Ok(self.db.contains_key(hash.as_bytes())?)
    }
}
