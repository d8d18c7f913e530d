//! Canonical clipboard entry.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Length of the hex suffix appended to the timestamp in an entry id.
const ID_SUFFIX_LEN: usize = 8;

/// How an entry's value is interpreted by renderers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    #[default]
    Text,
    Image,
}

impl EntryKind {
    /// Parse a stored kind tag. Accepts the legacy `type` spellings too.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "text" => Some(Self::Text),
            "image" | "image_url" => Some(Self::Image),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
        }
    }
}

/// One clipboard history record.
///
/// Serialized with the field names the stored documents have always used
/// (`isPinned`, `timestamp`, ...), so a canonical collection reads back
/// through the normalizer unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// Stable identity: `<timestamp>_<suffix>`.
    pub id: String,
    /// Payload: plain text, a URL, or an HTML fragment.
    pub value: String,
    pub kind: EntryKind,
    pub is_pinned: bool,
    /// Creation time, Unix epoch milliseconds.
    pub timestamp: u64,
}

impl Entry {
    /// Build a fresh unpinned entry with a random id.
    pub fn new(value: impl Into<String>, kind: EntryKind, timestamp: u64) -> Self {
        Self {
            id: fresh_id(timestamp),
            value: value.into(),
            kind,
            is_pinned: false,
            timestamp,
        }
    }
}

/// Generate a new random id for an entry created at `timestamp`.
pub fn fresh_id(timestamp: u64) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{timestamp}_{}", &suffix[..ID_SUFFIX_LEN])
}

/// Derive the id of a legacy entry that was stored without one.
///
/// Name-based (UUIDv5 over the value), so the same stored entry gets the
/// same id on every read and on every backend.
pub fn derived_id(timestamp: u64, value: &str) -> String {
    let suffix = Uuid::new_v5(&Uuid::NAMESPACE_OID, value.as_bytes())
        .simple()
        .to_string();
    format!("{timestamp}_{}", &suffix[..ID_SUFFIX_LEN])
}
