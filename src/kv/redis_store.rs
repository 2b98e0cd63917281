use crate::error::{Result, StoreError};
use crate::kv::KvStore;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};
use std::sync::Arc;

// Applies the write only when the current value matches the expectation.
// ARGV[1] is "1" when a current value is expected (carried in ARGV[2]),
// "0" when the key must be absent. ARGV[3] is the new value.
const COMPARE_AND_SET_SCRIPT: &str = r#"
local current = redis.call('GET', KEYS[1])
if ARGV[1] == '0' then
  if current == false then
    redis.call('SET', KEYS[1], ARGV[3])
    return 1
  end
  return 0
end
if current == ARGV[2] then
  redis.call('SET', KEYS[1], ARGV[3])
  return 1
end
return 0
"#;

/// Redis-based key/value backend
#[derive(Clone)]
pub struct RedisKv {
    client: Arc<Client>,
    connection: ConnectionManager,
    key_prefix: String,
}

impl RedisKv {
    /// Create a new Redis backend
    pub async fn new(redis_url: &str) -> Result<Self> {
        Self::new_with_prefix(redis_url, "incident-store").await
    }

    /// Create a new Redis backend with a custom key prefix
    pub async fn new_with_prefix(redis_url: &str, prefix: &str) -> Result<Self> {
        let client = Client::open(redis_url).map_err(|e| {
            StoreError::StorageUnavailable(format!("failed to create redis client: {}", e))
        })?;

        let connection = ConnectionManager::new(client.clone()).await.map_err(|e| {
            StoreError::StorageUnavailable(format!("failed to connect to redis: {}", e))
        })?;

        // Test connection
        let mut test_conn = connection.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut test_conn)
            .await
            .map_err(|e| {
                StoreError::StorageUnavailable(format!("redis connection test failed: {}", e))
            })?;

        tracing::info!("Initialized redis backend with prefix '{}'", prefix);

        Ok(Self {
            client: Arc::new(client),
            connection,
            key_prefix: prefix.to_string(),
        })
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.key_prefix, key)
    }
}

#[async_trait]
impl KvStore for RedisKv {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.connection.clone();
        conn.get(self.namespaced(key)).await.map_err(|e| {
            StoreError::StorageUnavailable(format!("failed to read key {}: {}", key, e))
        })
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<bool> {
        let mut conn = self.connection.clone();
        let _: () = conn.set(self.namespaced(key), value).await.map_err(|e| {
            StoreError::StorageUnavailable(format!("failed to write key {}: {}", key, e))
        })?;
        Ok(true)
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: &[u8],
    ) -> Result<bool> {
        let mut conn = self.connection.clone();
        let script = Script::new(COMPARE_AND_SET_SCRIPT);

        let applied: i32 = script
            .key(self.namespaced(key))
            .arg(if expected.is_some() { "1" } else { "0" })
            .arg(expected.unwrap_or_default())
            .arg(value)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| {
                StoreError::StorageUnavailable(format!(
                    "failed to compare-and-set key {}: {}",
                    key, e
                ))
            })?;

        Ok(applied == 1)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.connection.clone();
        let _: () = conn.del(self.namespaced(key)).await.map_err(|e| {
            StoreError::StorageUnavailable(format!("failed to delete key {}: {}", key, e))
        })?;
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<()> {
        let pattern = format!("{}*", self.namespaced(prefix));

        let mut scan_conn = self.connection.clone();
        let keys: Vec<String> = {
            let mut iter = scan_conn
                .scan_match::<_, String>(&pattern)
                .await
                .map_err(|e| {
                    StoreError::StorageUnavailable(format!(
                        "failed to scan prefix {}: {}",
                        prefix, e
                    ))
                })?;

            let mut keys = Vec::new();
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
            keys
        };

        if keys.is_empty() {
            return Ok(());
        }

        let mut conn = self.connection.clone();
        let _: () = conn.del(keys).await.map_err(|e| {
            StoreError::StorageUnavailable(format!("failed to delete under {}: {}", prefix, e))
        })?;
        Ok(())
    }

    async fn delete_all(&self) -> Result<()> {
        let mut conn = self.connection.clone();
        let _: () = redis::cmd("FLUSHDB")
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                StoreError::StorageUnavailable(format!("failed to flush database: {}", e))
            })?;
        Ok(())
    }
}
