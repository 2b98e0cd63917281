use crate::config::{StateBackend, StateConfig};
use crate::error::{Result, StoreError};
use crate::kv::{InMemoryKv, KvStore, RedisKv, SledKv};
use crate::store::{IncidentStore, KvIncidentStore};
use std::sync::Arc;

/// Create an incident store based on configuration
pub async fn create_store(config: &StateConfig) -> Result<Arc<dyn IncidentStore>> {
    let kv: Arc<dyn KvStore> = match config.backend {
        StateBackend::Memory => {
            tracing::info!("Initializing in-memory storage backend");
            Arc::new(InMemoryKv::new())
        }

        StateBackend::Sled => {
            let path = config.path.as_ref().ok_or_else(|| {
                StoreError::Configuration(
                    "Sled backend requires 'path' configuration".to_string(),
                )
            })?;

            tracing::info!(path = ?path, "Initializing sled storage backend");
            Arc::new(SledKv::new(path)?)
        }

        StateBackend::Redis => {
            let redis_url = config.redis_url.as_ref().ok_or_else(|| {
                StoreError::Configuration(
                    "Redis backend requires 'redis_url' configuration".to_string(),
                )
            })?;

            tracing::info!(url = %redis_url, "Initializing redis storage backend");
            Arc::new(RedisKv::new_with_prefix(redis_url, &config.redis_key_prefix).await?)
        }
    };

    Ok(Arc::new(KvIncidentStore::new(kv)))
}

/// Create an in-memory store (for testing and development)
pub fn create_in_memory_store() -> Arc<dyn IncidentStore> {
    tracing::info!("Initializing in-memory storage backend");
    Arc::new(KvIncidentStore::new(Arc::new(InMemoryKv::new())))
}
