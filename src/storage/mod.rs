//! Identity store: the record of listings that already triggered a notification.
//!
//! Commits are visible to `contains` immediately, but only survive a restart
//! once flushed.
//!
//! ## File Format
//!
//! ```text
//! {
//!   "version": 1,
//!   "updated_at": "2026-10-19T08:00:00Z",
//!   "count": 2,
//!   "entries": [
//!     { "source": "gewobag", "id": "a1", "notified_at": "..." },
//!     { "source": "wbm", "id": "u7", "notified_at": "..." }
//!   ]
//! }
//! ```

pub mod local;
pub mod memory;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::models::ListingKey;

pub use local::FileIdentityStore;
pub use memory::MemoryIdentityStore;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Durable set of notified listing keys. Single writer.
#[async_trait]
pub trait IdentityStore: Send {
    /// Whether a notification for this key was already recorded.
    fn contains(&self, key: &ListingKey) -> bool;

    /// Record a successful notification. Committing a known key is a no-op.
    fn commit(&mut self, key: ListingKey);

    /// Persist all commits atomically.
    async fn flush(&mut self) -> Result<(), StoreError>;

    /// Number of recorded keys.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One persisted key with the time it was first notified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreEntry {
    pub source: String,
    pub id: String,
    pub notified_at: DateTime<Utc>,
}

/// On-disk representation of the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default = "default_version")]
    pub version: u32,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub entries: Vec<StoreEntry>,
}

fn default_version() -> u32 {
    SNAPSHOT_VERSION
}

impl StoreSnapshot {
    /// Build a snapshot with entries sorted by `(source, id)`.
    pub fn from_entries(entries: &HashMap<ListingKey, DateTime<Utc>>) -> Self {
        let mut entries: Vec<StoreEntry> = entries
            .iter()
            .map(|(key, at)| StoreEntry {
                source: key.source.clone(),
                id: key.id.clone(),
                notified_at: *at,
            })
            .collect();
        entries.sort_by(|a, b| (&a.source, &a.id).cmp(&(&b.source, &b.id)));

        Self {
            version: SNAPSHOT_VERSION,
            updated_at: Utc::now(),
            count: entries.len(),
            entries,
        }
    }

    /// Index entries by key. The earliest `notified_at` wins on duplicates.
    pub fn into_map(self) -> HashMap<ListingKey, DateTime<Utc>> {
        let mut map = HashMap::with_capacity(self.entries.len());
        for entry in self.entries {
            map.entry(ListingKey::new(entry.source, entry.id))
                .and_modify(|at: &mut DateTime<Utc>| *at = (*at).min(entry.notified_at))
                .or_insert(entry.notified_at);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_sorted_by_source_then_id() {
        let now = Utc::now();
        let mut map = HashMap::new();
        map.insert(ListingKey::new("wbm", "u1"), now);
        map.insert(ListingKey::new("gewobag", "b"), now);
        map.insert(ListingKey::new("gewobag", "a"), now);

        let snapshot = StoreSnapshot::from_entries(&map);
        let keys: Vec<(&str, &str)> = snapshot
            .entries
            .iter()
            .map(|e| (e.source.as_str(), e.id.as_str()))
            .collect();
        assert_eq!(keys, vec![("gewobag", "a"), ("gewobag", "b"), ("wbm", "u1")]);
        assert_eq!(snapshot.count, 3);
        assert_eq!(snapshot.version, SNAPSHOT_VERSION);
    }

    #[test]
    fn test_duplicate_entries_keep_earliest() {
        let json = r#"{
            "updated_at": "2026-01-02T00:00:00Z",
            "entries": [
                {"source": "wbm", "id": "u1", "notified_at": "2026-01-02T00:00:00Z"},
                {"source": "wbm", "id": "u1", "notified_at": "2026-01-01T00:00:00Z"}
            ]
        }"#;
        let snapshot: StoreSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.version, 1);

        let map = snapshot.into_map();
        assert_eq!(map.len(), 1);
        let at = map[&ListingKey::new("wbm", "u1")];
        assert_eq!(at.to_rfc3339(), "2026-01-01T00:00:00+00:00");
    }
}
