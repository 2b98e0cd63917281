//! Incident persistence over a primitive key/value capability.
//!
//! Full incident records live under per-ID keys; a lightweight header index
//! is maintained as a single blob under a fixed key so listings and filters
//! never load full records. Lookups work by ID, by associated channel, and
//! by team filter. Backends: in-memory, sled, redis.

pub mod config;
pub mod error;
pub mod kv;
pub mod models;
pub mod store;
pub mod telemetry;

pub use config::{Config, ObservabilityConfig, StateBackend, StateConfig};
pub use error::{Result, StoreError};
pub use kv::{InMemoryKv, KvStore, RedisKv, SledKv};
pub use models::{Header, Incident};
pub use store::{
    create_in_memory_store, create_store, HeaderFilter, IncidentStore, KvIncidentStore,
};
