//! In-process backend. Used for tests and ephemeral daemons.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{Backend, BackendError, check_quota};

#[derive(Debug)]
pub struct MemoryBackend {
    name: String,
    doc: Mutex<Map<String, Value>>,
    quota: Option<usize>,
}

impl MemoryBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc: Mutex::new(Map::new()),
            quota: None,
        }
    }

    /// Cap the document at `quota` bytes (see [`super::document_size`]).
    pub fn with_quota(mut self, quota: usize) -> Self {
        self.quota = Some(quota);
        self
    }

    fn doc(&self) -> MutexGuard<'_, Map<String, Value>> {
        // A panicked writer never leaves a half-applied map behind: writes
        // swap in a fully built document.
        self.doc.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, BackendError> {
        Ok(self.doc().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), BackendError> {
        let mut doc = self.doc();
        let mut next = doc.clone();
        next.insert(key.to_string(), value);
        check_quota(&next, self.quota)?;
        *doc = next;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), BackendError> {
        self.doc().remove(key);
        Ok(())
    }
}
