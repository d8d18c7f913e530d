//! JSON-file backend.
//!
//! The whole document lives in one file. Writes go to a sibling temp file
//! that is renamed over the original, so a reader never sees a torn
//! document. A per-backend async mutex serializes writers within this
//! process.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use super::{Backend, BackendError, check_quota};

#[derive(Debug)]
pub struct JsonFileBackend {
    name: String,
    path: PathBuf,
    quota: Option<usize>,
    write_lock: Mutex<()>,
}

impl JsonFileBackend {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, quota: Option<usize>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            quota,
            write_lock: Mutex::new(()),
        }
    }

    async fn read_doc(&self) -> Result<Map<String, Value>, BackendError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => {
                return Err(BackendError::Io {
                    path: self.path.clone(),
                    source: e,
                });
            }
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Map::new());
        }
        serde_json::from_slice(&bytes).map_err(|e| BackendError::Corrupt {
            path: self.path.clone(),
            source: e,
        })
    }

    async fn write_doc(&self, doc: &Map<String, Value>) -> Result<(), BackendError> {
        let io_err = |source| BackendError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let bytes = serde_json::to_vec(doc).map_err(|e| BackendError::Corrupt {
            path: self.path.clone(),
            source: e,
        })?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;
        Ok(())
    }
}

#[async_trait]
impl Backend for JsonFileBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, BackendError> {
        let mut doc = self.read_doc().await?;
        Ok(doc.remove(key))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), BackendError> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.read_doc().await?;
        doc.insert(key.to_string(), value);
        check_quota(&doc, self.quota)?;
        self.write_doc(&doc).await
    }

    async fn remove(&self, key: &str) -> Result<(), BackendError> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.read_doc().await?;
        if doc.remove(key).is_some() {
            self.write_doc(&doc).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let b = JsonFileBackend::new("f", dir.path().join("store.json"), None);
        assert_eq!(b.get("copiedItems").await.unwrap(), None);
    }

    #[tokio::test]
    async fn values_survive_a_new_handle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");
        {
            let b = JsonFileBackend::new("f", &path, None);
            b.set("k", json!({"a": 1})).await.unwrap();
            b.set("other", json!("x")).await.unwrap();
        }
        let b = JsonFileBackend::new("f", &path, None);
        assert_eq!(b.get("k").await.unwrap(), Some(json!({"a": 1})));
        assert_eq!(b.get("other").await.unwrap(), Some(json!("x")));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn remove_drops_only_that_key() {
        let dir = tempfile::tempdir().unwrap();
        let b = JsonFileBackend::new("f", dir.path().join("store.json"), None);
        b.set("a", json!(1)).await.unwrap();
        b.set("b", json!(2)).await.unwrap();
        b.remove("a").await.unwrap();
        b.remove("never-set").await.unwrap();
        assert_eq!(b.get("a").await.unwrap(), None);
        assert_eq!(b.get("b").await.unwrap(), Some(json!(2)));
    }

    #[tokio::test]
    async fn quota_exceeded_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let b = JsonFileBackend::new("f", &path, Some(32));
        b.set("k", json!("fits")).await.unwrap();
        let err = b.set("k", json!("y".repeat(100))).await.unwrap_err();
        assert!(err.is_quota_exceeded());
        assert_eq!(b.get("k").await.unwrap(), Some(json!("fits")));
    }

    #[tokio::test]
    async fn garbage_file_is_reported_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();
        let b = JsonFileBackend::new("f", &path, None);
        let err = b.get("k").await.unwrap_err();
        assert!(matches!(err, BackendError::Corrupt { .. }));
    }
}
