//! Backend adapters: interchangeable key/value document stores.
//!
//! A backend holds one JSON object document. The store reads and writes
//! whole values under a handful of well-known keys; it never assumes
//! transactions. Two instances run side by side: a small quota-bounded
//! "sync" backend and a larger device-local one.

mod file;
mod memory;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::settings::StorageMode;

pub use file::JsonFileBackend;
pub use memory::MemoryBackend;

/// Ordered clipboard entries.
pub const ITEMS_KEY: &str = "copiedItems";
/// Seven colour tokens.
pub const THEME_KEY: &str = "extensionTheme";
/// Active backend selector (`"sync"` / `"local"`). Lives on the local backend.
pub const STORAGE_MODE_KEY: &str = "storageMode";
/// Image capture format (`"srcurl"` / `"base64"`). Lives on the local backend.
pub const IMAGE_STORAGE_MODE_KEY: &str = "imageStorageMode";
/// Previous image capture format, consulted when the current one is unset.
pub const LAST_IMAGE_STORAGE_MODE_KEY: &str = "lastImageStorageMode";

/// Quota of the sync backend, in bytes.
pub const SYNC_QUOTA_BYTES: usize = 102_400;
/// Default quota of the local backend, in bytes.
pub const LOCAL_QUOTA_BYTES: usize = 10 * 1024 * 1024;

/// Errors returned by backend adapters.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("quota exceeded: document needs {needed} bytes, quota is {quota}")]
    QuotaExceeded { needed: usize, quota: usize },
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("corrupt document {path}: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl BackendError {
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::QuotaExceeded { .. })
    }
}

/// A key/value document store.
///
/// Every method may suspend. A failed `set` or `remove` leaves the stored
/// document as it was.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    async fn get(&self, key: &str) -> Result<Option<Value>, BackendError>;

    async fn set(&self, key: &str, value: Value) -> Result<(), BackendError>;

    async fn remove(&self, key: &str) -> Result<(), BackendError>;
}

/// Bytes a document occupies against its quota: each key plus the
/// compact JSON form of its value.
pub fn document_size(doc: &Map<String, Value>) -> usize {
    doc.iter()
        .map(|(key, value)| key.len() + value.to_string().len())
        .sum()
}

/// Reject `doc` if it does not fit in `quota`.
pub(crate) fn check_quota(doc: &Map<String, Value>, quota: Option<usize>) -> Result<(), BackendError> {
    if let Some(quota) = quota {
        let needed = document_size(doc);
        if needed > quota {
            return Err(BackendError::QuotaExceeded { needed, quota });
        }
    }
    Ok(())
}

/// The pair of backends a storage mode selects between.
#[derive(Clone)]
pub struct Backends {
    pub sync: Arc<dyn Backend>,
    pub local: Arc<dyn Backend>,
}

impl Backends {
    pub fn new(sync: Arc<dyn Backend>, local: Arc<dyn Backend>) -> Self {
        Self { sync, local }
    }

    /// The backend that holds the collection in `mode`.
    pub fn for_mode(&self, mode: StorageMode) -> Arc<dyn Backend> {
        match mode {
            StorageMode::Sync => Arc::clone(&self.sync),
            StorageMode::Local => Arc::clone(&self.local),
        }
    }
}
