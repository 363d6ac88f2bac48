//! Content-addressed sample cache
//!
//! Development-mode runs persist a bounded sample plus schema snapshot per
//! node at `cache/<content_hash>.sample`. The hash covers the node's
//! effective definition, so an edit anywhere upstream changes the key and
//! old entries simply stop being found. Writes are atomic (temp + rename);
//! a mismatched or unreadable entry is treated as a miss, never an error.

use std::fs;
use std::path::{Path, PathBuf};

use crate::engine::io::atomic_write;
use crate::engine::DataTable;
use crate::error::Result;
use crate::settings::FlowId;

/// Per-graph sample cache rooted at `<root>/<graph_id>/`
#[derive(Debug, Clone)]
pub struct SampleCache {
    dir: PathBuf,
}

impl SampleCache {
    pub fn new(root: impl Into<PathBuf>, graph_id: FlowId) -> Self {
        Self {
            dir: root.into().join(graph_id.to_string()),
        }
    }

    /// Path of the entry for a content hash
    pub fn entry_path(&self, content_hash: &str) -> PathBuf {
        self.dir.join(format!("{}.sample", content_hash))
    }

    /// Load a cached sample; any failure is a miss
    pub fn load(&self, content_hash: &str) -> Option<DataTable> {
        let path = self.entry_path(content_hash);
        let bytes = fs::read(&path).ok()?;
        match serde_json::from_slice::<DataTable>(&bytes) {
            Ok(table) => Some(table),
            Err(e) => {
                tracing::debug!(
                    path = %path.display(),
                    error = %e,
                    "discarding unreadable cache entry"
                );
                None
            }
        }
    }

    /// Persist a sample atomically, returning the entry path
    pub fn store(&self, content_hash: &str, table: &DataTable) -> Result<PathBuf> {
        let path = self.entry_path(content_hash);
        let bytes = serde_json::to_vec(table)?;
        atomic_write(&path, &bytes).map_err(|e| match e {
            crate::engine::EngineError::Io(io) => crate::error::FlowError::Io(io),
            other => crate::error::FlowError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                other.to_string(),
            )),
        })?;
        Ok(path)
    }

    /// Drop one entry (node removed or hash changed)
    pub fn remove(&self, content_hash: &str) {
        let _ = fs::remove_file(self.entry_path(content_hash));
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Field, LogicalType, Schema};
    use serde_json::json;
    use tempfile::TempDir;

    fn table() -> DataTable {
        DataTable::new(
            Schema::new(vec![Field::new("a", LogicalType::Int64)]),
            vec![vec![json!(1)], vec![json!(2)]],
        )
        .unwrap()
    }

    #[test]
    fn test_store_and_load_roundtrip() {
        let root = TempDir::new().unwrap();
        let cache = SampleCache::new(root.path(), 7);

        assert!(cache.load("abc").is_none());
        let path = cache.store("abc", &table()).unwrap();
        assert!(path.ends_with("7/abc.sample"));
        assert_eq!(cache.load("abc").unwrap(), table());
    }

    #[test]
    fn test_corrupt_entry_is_a_miss() {
        let root = TempDir::new().unwrap();
        let cache = SampleCache::new(root.path(), 7);
        fs::create_dir_all(cache.dir()).unwrap();
        fs::write(cache.entry_path("bad"), b"not json").unwrap();
        assert!(cache.load("bad").is_none());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let root = TempDir::new().unwrap();
        let cache = SampleCache::new(root.path(), 7);
        cache.store("x", &table()).unwrap();
        cache.remove("x");
        cache.remove("x");
        assert!(cache.load("x").is_none());
    }
}
