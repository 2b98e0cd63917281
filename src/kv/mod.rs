pub mod memory;
pub mod redis_store;
pub mod sled_store;

pub use memory::InMemoryKv;
pub use redis_store::RedisKv;
pub use sled_store::SledKv;

use crate::error::Result;
use async_trait::async_trait;

/// The primitive key/value capability the incident store is built on.
///
/// Implementations hold no knowledge of what the keys mean; the store layer
/// owns key layout and serialization. Contract notes:
/// - `get` returns `Ok(None)` for a key that has never been written; the
///   store relies on this to bootstrap an empty header index.
/// - `set` may report `Ok(false)` when the backend declined the write
///   without failing; callers must treat that as an error, not success.
/// - `compare_and_set` applies the write only if the current value equals
///   `expected` (`None` meaning the key must be absent) and reports whether
///   it did.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read a value, `Ok(None)` if the key does not exist
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write a value, reporting whether the backend accepted it
    async fn set(&self, key: &str, value: &[u8]) -> Result<bool>;

    /// Write a value only if the current value matches `expected`
    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: &[u8],
    ) -> Result<bool>;

    /// Remove a single key; removing an absent key is not an error
    async fn delete(&self, key: &str) -> Result<()>;

    /// Remove every key under the given prefix
    async fn delete_prefix(&self, prefix: &str) -> Result<()>;

    /// Remove every key in the namespace. Destructive: assumes this store
    /// exclusively owns the keyspace. Reset tooling only.
    async fn delete_all(&self) -> Result<()>;
}
