use crate::error::{Result, StoreError};
use crate::kv::KvStore;
use async_trait::async_trait;
use sled::Db;
use std::path::Path;
use std::sync::Arc;

/// Persistent key/value backend using the Sled embedded database
#[derive(Clone)]
pub struct SledKv {
    db: Arc<Db>,
    tree: sled::Tree,
}

impl SledKv {
    /// Open or create a Sled-backed store at the specified path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(&path).map_err(|e| {
            StoreError::StorageUnavailable(format!("failed to open sled database: {}", e))
        })?;

        let tree = db.open_tree("kv").map_err(|e| {
            StoreError::StorageUnavailable(format!("failed to open kv tree: {}", e))
        })?;

        tracing::info!(path = ?path.as_ref(), "Initialized sled backend");

        Ok(Self {
            db: Arc::new(db),
            tree,
        })
    }

    fn flush(&self) -> Result<()> {
        self.tree.flush().map_err(|e| {
            StoreError::StorageUnavailable(format!("failed to flush kv tree: {}", e))
        })?;
        Ok(())
    }

    /// Get database size in bytes
    pub fn size_on_disk(&self) -> Result<u64> {
        self.db.size_on_disk().map_err(|e| {
            StoreError::StorageUnavailable(format!("failed to get database size: {}", e))
        })
    }
}

#[async_trait]
impl KvStore for SledKv {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let value = self.tree.get(key).map_err(|e| {
            StoreError::StorageUnavailable(format!("failed to read key {}: {}", key, e))
        })?;
        Ok(value.map(|ivec| ivec.to_vec()))
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<bool> {
        self.tree.insert(key, value).map_err(|e| {
            StoreError::StorageUnavailable(format!("failed to write key {}: {}", key, e))
        })?;
        self.flush()?;
        Ok(true)
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: &[u8],
    ) -> Result<bool> {
        let swap = self
            .tree
            .compare_and_swap(key, expected, Some(value))
            .map_err(|e| {
                StoreError::StorageUnavailable(format!(
                    "failed to compare-and-swap key {}: {}",
                    key, e
                ))
            })?;

        match swap {
            Ok(()) => {
                self.flush()?;
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.tree.remove(key).map_err(|e| {
            StoreError::StorageUnavailable(format!("failed to delete key {}: {}", key, e))
        })?;
        self.flush()
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<()> {
        let keys: Vec<sled::IVec> = self
            .tree
            .scan_prefix(prefix)
            .keys()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| {
                StoreError::StorageUnavailable(format!(
                    "failed to scan prefix {}: {}",
                    prefix, e
                ))
            })?;

        for key in keys {
            self.tree.remove(&key).map_err(|e| {
                StoreError::StorageUnavailable(format!("failed to delete under {}: {}", prefix, e))
            })?;
        }
        self.flush()
    }

    async fn delete_all(&self) -> Result<()> {
        self.tree.clear().map_err(|e| {
            StoreError::StorageUnavailable(format!("failed to clear kv tree: {}", e))
        })?;
        self.flush()
    }
}
