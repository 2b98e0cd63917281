//! Key layout for everything the incident store persists.

/// Prefix for per-incident record keys
pub const INCIDENT_KEY_PREFIX: &str = "incident_";

/// Fixed key holding the header index blob
pub const ALL_HEADERS_KEY: &str = "all_headers";

/// Physical key for an incident record
pub fn incident_key(id: &str) -> String {
    format!("{}{}", INCIDENT_KEY_PREFIX, id)
}
