//! Item store: the clipboard history collection of one backend.
//!
//! Every mutation runs the same pipeline: read the raw collection,
//! normalize it, apply the change, reorder, bound, and write the whole
//! collection back with a single `set`. A failed read or write leaves the
//! stored collection as it was.
//!
//! The read-modify-write is not guarded against other writers of the same
//! backend. Callers that need two mutations to observe each other must
//! await the first before issuing the second; the daemon does this by
//! running every request on its single state loop.

pub mod capacity;
pub mod entry;
pub mod menu;
pub mod merge;
pub mod normalize;
pub mod order;
mod switch;

use std::sync::Arc;

use serde_json::Value;

use crate::backend::{Backend, BackendError, ITEMS_KEY};
use crate::clock::Clock;
use crate::notify::{Notifier, StoreEvent};

pub use capacity::{DEFAULT_MAX_ITEMS, bound};
pub use entry::{Entry, EntryKind};
pub use merge::merge;
pub use normalize::normalize;
pub use order::reorder;
pub use switch::switch_storage;

/// Store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("backend: {0}")]
    Backend(#[from] BackendError),
    #[error("entry not found: {0}")]
    NotFound(String),
    #[error("refusing to store a blank value")]
    BlankValue,
}

impl StoreError {
    /// Machine-readable reason, as sent over IPC.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Backend(e) if e.is_quota_exceeded() => "quota_exceeded",
            Self::Backend(_) => "backend_failure",
            Self::NotFound(_) => "not_found",
            Self::BlankValue => "blank_value",
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone, Copy)]
pub struct StoreConfig {
    /// Collection size limit.
    pub max_items: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_items: DEFAULT_MAX_ITEMS,
        }
    }
}

/// Clipboard history bound to one backend.
pub struct ItemStore {
    backend: Arc<dyn Backend>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    config: StoreConfig,
}

impl ItemStore {
    pub fn new(
        backend: Arc<dyn Backend>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        config: StoreConfig,
    ) -> Self {
        Self {
            backend,
            notifier,
            clock,
            config,
        }
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// The collection in canonical order. Read-only: repairs made while
    /// reading are not written back (see [`ItemStore::migrate`]).
    pub async fn entries(&self) -> Result<Vec<Entry>, StoreError> {
        Ok(reorder(self.load().await?))
    }

    /// Look up one entry by id.
    pub async fn get(&self, id: &str) -> Result<Option<Entry>, StoreError> {
        Ok(self.load().await?.into_iter().find(|e| e.id == id))
    }

    /// Add a new unpinned entry.
    ///
    /// Succeeds at capacity: the oldest unpinned entry is dropped after
    /// the insert. Returns the entry as created.
    ///
    /// When the pinned band already fills `max_items` (or the clock puts
    /// the new entry behind every kept one), bounding drops the new entry
    /// itself. The rest of the collection is still written and the entry
    /// is returned, but [`ItemStore::get`] will not find it.
    pub async fn insert(&self, value: impl Into<String>, kind: EntryKind) -> Result<Entry, StoreError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(StoreError::BlankValue);
        }
        let mut entries = self.load().await?;
        let timestamp = self.clock.now_millis();
        let entry = Entry {
            id: normalize::unused_id(&entries, timestamp),
            value,
            kind,
            is_pinned: false,
            timestamp,
        };
        entries.push(entry.clone());
        let stored = self.persist(entries).await?;
        if !stored.iter().any(|e| e.id == entry.id) {
            tracing::warn!(
                id = %entry.id,
                max_items = self.config.max_items,
                "inserted entry fell outside capacity"
            );
        }

        tracing::info!(id = %entry.id, kind = kind.as_str(), backend = self.backend.name(), "entry inserted");
        self.notifier.notify(StoreEvent::ItemsChanged);
        Ok(entry)
    }

    /// Remove the entry with `id`.
    ///
    /// A missing id is already-satisfied: nothing is written and `false`
    /// is returned.
    pub async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let mut entries = self.load().await?;
        let before = entries.len();
        entries.retain(|e| e.id != id);
        if entries.len() == before {
            tracing::warn!(id, "delete: entry not found, nothing to do");
            return Ok(false);
        }
        self.persist(entries).await?;

        tracing::info!(id, backend = self.backend.name(), "entry deleted");
        self.notifier.notify(StoreEvent::ItemsChanged);
        Ok(true)
    }

    /// Flip the pin state of the entry with `id`.
    ///
    /// A newly pinned entry moves to the front of the pinned band; a newly
    /// unpinned one falls back to its recency position.
    pub async fn toggle_pin(&self, id: &str) -> Result<Entry, StoreError> {
        let mut entries = self.entries().await?;
        let index = entries
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let mut entry = entries.remove(index);
        entry.is_pinned = !entry.is_pinned;
        if entry.is_pinned {
            entries.insert(0, entry.clone());
        } else {
            entries.push(entry.clone());
        }
        self.persist(entries).await?;

        tracing::info!(id, pinned = entry.is_pinned, "pin toggled");
        self.notifier.notify(StoreEvent::ItemsChanged);
        Ok(entry)
    }

    /// Empty the collection, pinned entries included.
    pub async fn clear_all(&self) -> Result<(), StoreError> {
        self.backend.remove(ITEMS_KEY).await?;
        tracing::info!(backend = self.backend.name(), "collection cleared");
        self.notifier.notify(StoreEvent::ItemsChanged);
        Ok(())
    }

    /// Rewrite the stored collection in canonical form if it is not already.
    ///
    /// Returns whether anything was written.
    pub async fn migrate(&self) -> Result<bool, StoreError> {
        let Some(stored) = self.backend.get(ITEMS_KEY).await? else {
            tracing::debug!(backend = self.backend.name(), "no collection, nothing to migrate");
            return Ok(false);
        };
        let raw = as_collection(stored.clone(), self.backend.name());
        let canonical = self.canonicalize(normalize(&raw, self.clock.now_millis()));
        let encoded = Value::Array(normalize::to_raw(&canonical));
        if encoded == stored {
            tracing::debug!(backend = self.backend.name(), "collection already canonical");
            return Ok(false);
        }
        self.backend.set(ITEMS_KEY, encoded).await?;
        tracing::info!(
            backend = self.backend.name(),
            entries = canonical.len(),
            "collection migrated"
        );
        self.notifier.notify(StoreEvent::ItemsChanged);
        Ok(true)
    }

    async fn load(&self) -> Result<Vec<Entry>, StoreError> {
        let raw = read_raw(self.backend.as_ref()).await?;
        Ok(normalize(&raw, self.clock.now_millis()))
    }

    /// Write the canonical form of `entries` and return what was stored.
    async fn persist(&self, entries: Vec<Entry>) -> Result<Vec<Entry>, StoreError> {
        let canonical = self.canonicalize(entries);
        self.backend
            .set(ITEMS_KEY, Value::Array(normalize::to_raw(&canonical)))
            .await?;
        Ok(canonical)
    }

    fn canonicalize(&self, entries: Vec<Entry>) -> Vec<Entry> {
        bound(reorder(entries), self.config.max_items)
    }
}

/// Read the raw stored collection of `backend`. Absent reads as empty.
pub(crate) async fn read_raw(backend: &dyn Backend) -> Result<Vec<Value>, BackendError> {
    Ok(backend
        .get(ITEMS_KEY)
        .await?
        .map(|stored| as_collection(stored, backend.name()))
        .unwrap_or_default())
}

/// A stored collection that is not an array is corrupt beyond repair.
fn as_collection(stored: Value, backend: &str) -> Vec<Value> {
    match stored {
        Value::Array(items) => items,
        other => {
            tracing::warn!(backend, stored = ?other, "stored collection is not a list, discarding");
            Vec::new()
        }
    }
}
