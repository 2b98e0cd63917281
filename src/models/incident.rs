use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Lightweight summary of an incident, kept in the shared header index so
/// listings and filters never have to load full records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Header {
    /// Unique identifier. Empty until the store assigns one on create,
    /// immutable afterwards.
    #[serde(default)]
    pub id: String,

    /// Human-readable name
    #[validate(length(min = 1, max = 500))]
    pub name: String,

    /// Whether the incident is ongoing
    pub is_active: bool,

    /// Current commander
    #[serde(default)]
    pub commander_user_id: String,

    /// Owning team, used for filtering
    #[serde(default)]
    pub team_id: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Set once the incident has ended
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
}

/// A full incident record. The header is embedded flat so the record and its
/// index entry always agree on the summary fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Incident {
    #[serde(flatten)]
    #[validate(nested)]
    pub header: Header,

    /// Channels associated with this incident, in attachment order. A
    /// channel may appear in more than one incident.
    #[serde(default)]
    pub channel_ids: Vec<String>,

    /// Announcement post reference, opaque to the store
    #[serde(default)]
    pub post_id: String,
}

impl Incident {
    /// Create a new incident with no identifier. The store assigns one.
    pub fn new(name: String, team_id: String, commander_user_id: String) -> Self {
        Self {
            header: Header {
                id: String::new(),
                name,
                is_active: true,
                commander_user_id,
                team_id,
                created_at: Utc::now(),
                ended_at: None,
            },
            channel_ids: Vec::new(),
            post_id: String::new(),
        }
    }

    /// The incident's identifier, empty if not yet created
    pub fn id(&self) -> &str {
        &self.header.id
    }

    /// Attach a channel
    pub fn add_channel(&mut self, channel_id: String) {
        self.channel_ids.push(channel_id);
    }

    /// Mark the incident as ended
    pub fn end(&mut self) {
        self.header.is_active = false;
        self.header.ended_at = Some(Utc::now());
    }
}
