use crate::error::Result;
use crate::kv::KvStore;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// In-memory key/value backend (for MVP and testing)
#[derive(Clone, Default)]
pub struct InMemoryKv {
    entries: Arc<DashMap<String, Vec<u8>>>,
}

impl InMemoryKv {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
        }
    }
}

#[async_trait]
impl KvStore for InMemoryKv {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key).map(|entry| entry.clone()))
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<bool> {
        self.entries.insert(key.to_string(), value.to_vec());
        Ok(true)
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: &[u8],
    ) -> Result<bool> {
        // The entry guard holds the shard lock, making the compare and the
        // swap a single atomic step per key.
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut entry) => match expected {
                Some(expected) if entry.get().as_slice() == expected => {
                    entry.insert(value.to_vec());
                    Ok(true)
                }
                _ => Ok(false),
            },
            Entry::Vacant(entry) => match expected {
                None => {
                    entry.insert(value.to_vec());
                    Ok(true)
                }
                Some(_) => Ok(false),
            },
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<()> {
        self.entries.retain(|key, _| !key.starts_with(prefix));
        Ok(())
    }

    async fn delete_all(&self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }
}
