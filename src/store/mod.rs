pub mod factory;
pub mod keys;
pub mod kv_store;

pub use factory::{create_in_memory_store, create_store};
pub use kv_store::KvIncidentStore;

use crate::error::Result;
use crate::models::{Header, Incident};
use async_trait::async_trait;

/// Trait for incident storage operations.
///
/// Consistency contract: a record write and its header-index update are two
/// independent operations against the backing key/value store. Index
/// maintenance is best-effort: a failure between the two leaves a record
/// persisted but invisible to every lookup (all read paths start from the
/// index). Callers own retry policy for `StorageUnavailable` failures.
#[async_trait]
pub trait IncidentStore: Send + Sync {
    /// Create a new incident. The incident must not carry an ID; the store
    /// assigns one and returns the incident with it populated.
    async fn create_incident(&self, incident: Incident) -> Result<Incident>;

    /// Update an existing incident, overwriting its prior content entirely
    async fn update_incident(&self, incident: &Incident) -> Result<()>;

    /// Get an incident by ID
    async fn get_incident(&self, id: &str) -> Result<Incident>;

    /// Get the ID of the incident associated with the given channel
    async fn get_incident_id_for_channel(&self, channel_id: &str) -> Result<String>;

    /// List headers matching the filter, in no guaranteed order
    async fn get_headers(&self, filter: &HeaderFilter) -> Result<Vec<Header>>;

    /// Delete every key this store owns: all records and the header index.
    /// Co-located keys outside the store's namespace are left alone.
    async fn wipe_all(&self) -> Result<()>;
}

/// Filter for header listings
#[derive(Debug, Clone, Default)]
pub struct HeaderFilter {
    /// Match only headers with this team ID; `None` matches all
    pub team_id: Option<String>,
}

impl HeaderFilter {
    pub fn matches(&self, header: &Header) -> bool {
        match &self.team_id {
            Some(team_id) => header.team_id == *team_id,
            None => true,
        }
    }
}
