//! Storage-mode switch: merge both backends into the target.
//!
//! The switch is all-or-nothing from the outside: both collections are
//! read before anything is written, the `storageMode` selector is written
//! only after the merged collection (and the theme) has been stored, and a
//! failed write restores what the target held before.

use serde_json::Value;

use crate::backend::{Backend, Backends, ITEMS_KEY, STORAGE_MODE_KEY, THEME_KEY};
use crate::notify::{Notifier, StoreEvent};
use crate::settings::StorageMode;

use super::normalize::to_raw;
use super::{Entry, StoreError, merge, read_raw};

/// Make `target` the active storage mode, carrying every entry from both
/// backends across. The stored theme follows from the `current` backend
/// when the mode actually changes. Returns the merged collection now
/// stored on `target`.
///
/// # Errors
///
/// Any backend failure aborts the switch. Neither collection, the theme,
/// nor the selector is changed by an aborted switch.
pub async fn switch_storage(
    backends: &Backends,
    current: StorageMode,
    target: StorageMode,
    max_items: usize,
    now: u64,
    notifier: &dyn Notifier,
) -> Result<Vec<Entry>, StoreError> {
    let sync_raw = read_raw(backends.sync.as_ref()).await?;
    let local_raw = read_raw(backends.local.as_ref()).await?;
    let merged = merge(&sync_raw, &local_raw, max_items, now);

    let destination = backends.for_mode(target);
    let theme = if current == target {
        None
    } else {
        backends.for_mode(current).get(THEME_KEY).await?
    };
    let previous_items = destination.get(ITEMS_KEY).await?;
    let previous_theme = match theme {
        Some(_) => destination.get(THEME_KEY).await?,
        None => None,
    };

    destination
        .set(ITEMS_KEY, Value::Array(to_raw(&merged)))
        .await?;

    let carried = match theme {
        Some(theme) => destination.set(THEME_KEY, theme).await.map(|()| true),
        None => Ok(false),
    };
    let carried = match carried {
        Ok(carried) => carried,
        Err(e) => {
            tracing::error!(error = %e, %target, "theme write failed, restoring target collection");
            restore(destination.as_ref(), ITEMS_KEY, previous_items).await;
            return Err(e.into());
        }
    };

    if let Err(e) = backends
        .local
        .set(STORAGE_MODE_KEY, Value::String(target.as_str().into()))
        .await
    {
        tracing::error!(error = %e, %target, "storage mode write failed, restoring target");
        restore(destination.as_ref(), ITEMS_KEY, previous_items).await;
        if carried {
            restore(destination.as_ref(), THEME_KEY, previous_theme).await;
        }
        return Err(e.into());
    }

    tracing::info!(
        %target,
        entries = merged.len(),
        from_sync = sync_raw.len(),
        from_local = local_raw.len(),
        theme_carried = carried,
        "storage mode switched"
    );
    notifier.notify(StoreEvent::StorageModeChanged { mode: target });
    notifier.notify(StoreEvent::ItemsChanged);
    Ok(merged)
}

async fn restore(backend: &dyn Backend, key: &str, previous: Option<Value>) {
    let result = match previous {
        Some(value) => backend.set(key, value).await,
        None => backend.remove(key).await,
    };
    if let Err(e) = result {
        tracing::error!(error = %e, backend = backend.name(), key, "failed to restore value");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::backend::{BackendError, MemoryBackend};
    use crate::notify::NullNotifier;
    use crate::notify::testing::RecordingNotifier;

    /// Memory backend whose reads or writes can be made to fail.
    struct FlakyBackend {
        inner: MemoryBackend,
        fail_get: AtomicBool,
        fail_set_key: Option<&'static str>,
    }

    impl FlakyBackend {
        fn new(name: &str) -> Self {
            Self {
                inner: MemoryBackend::new(name),
                fail_get: AtomicBool::new(false),
                fail_set_key: None,
            }
        }
    }

    #[async_trait]
    impl Backend for FlakyBackend {
        fn name(&self) -> &str {
            self.inner.name()
        }

        async fn get(&self, key: &str) -> Result<Option<Value>, BackendError> {
            if self.fail_get.load(Ordering::SeqCst) {
                return Err(BackendError::Unavailable("read failed".into()));
            }
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: Value) -> Result<(), BackendError> {
            if self.fail_set_key == Some(key) {
                return Err(BackendError::Unavailable("write failed".into()));
            }
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> Result<(), BackendError> {
            self.inner.remove(key).await
        }
    }

    const NOW: u64 = 10_000;

    #[tokio::test]
    async fn switch_merges_both_and_sets_selector() {
        let sync = Arc::new(MemoryBackend::new("sync"));
        let local = Arc::new(MemoryBackend::new("local"));
        sync.set(ITEMS_KEY, json!([{ "id": "A", "timestamp": 10, "value": "x" }]))
            .await
            .unwrap();
        local
            .set(
                ITEMS_KEY,
                json!([
                    { "id": "A", "timestamp": 20, "value": "y" },
                    { "id": "B", "timestamp": 5, "value": "b" },
                ]),
            )
            .await
            .unwrap();
        let backends = Backends::new(sync.clone(), local.clone());
        let notifier = RecordingNotifier::default();

        let merged = switch_storage(
            &backends,
            StorageMode::Sync,
            StorageMode::Local,
            100,
            NOW,
            &notifier,
        )
        .await
        .unwrap();

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].value, "y");
        assert_eq!(
            local.get(STORAGE_MODE_KEY).await.unwrap(),
            Some(json!("local"))
        );
        let stored = local.get(ITEMS_KEY).await.unwrap().unwrap();
        assert_eq!(stored.as_array().unwrap().len(), 2);
        // Source backend is left as it was.
        assert_eq!(
            sync.get(ITEMS_KEY).await.unwrap(),
            Some(json!([{ "id": "A", "timestamp": 10, "value": "x" }]))
        );
        assert_eq!(
            notifier.events(),
            vec![
                StoreEvent::StorageModeChanged {
                    mode: StorageMode::Local
                },
                StoreEvent::ItemsChanged
            ]
        );
    }

    #[tokio::test]
    async fn read_failure_aborts_without_writes() {
        let sync = Arc::new(FlakyBackend::new("sync"));
        let local = Arc::new(MemoryBackend::new("local"));
        local.set(ITEMS_KEY, json!(["keep"])).await.unwrap();
        sync.fail_get.store(true, Ordering::SeqCst);
        let backends = Backends::new(sync.clone(), local.clone());

        let err = switch_storage(
            &backends,
            StorageMode::Sync,
            StorageMode::Local,
            100,
            NOW,
            &NullNotifier,
        )
        .await
        .unwrap_err();

        assert_eq!(err.reason(), "backend_failure");
        assert_eq!(local.get(ITEMS_KEY).await.unwrap(), Some(json!(["keep"])));
        assert_eq!(local.get(STORAGE_MODE_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn quota_exceeded_on_target_leaves_pre_switch_state() {
        let sync = Arc::new(MemoryBackend::new("sync").with_quota(200));
        let local = Arc::new(MemoryBackend::new("local"));
        local.set(STORAGE_MODE_KEY, json!("local")).await.unwrap();
        let big: Vec<Value> = (0..20)
            .map(|i| json!({ "id": format!("e{i}"), "timestamp": i, "value": "v".repeat(40) }))
            .collect();
        local.set(ITEMS_KEY, Value::Array(big.clone())).await.unwrap();
        let backends = Backends::new(sync.clone(), local.clone());

        let err = switch_storage(
            &backends,
            StorageMode::Local,
            StorageMode::Sync,
            100,
            NOW,
            &NullNotifier,
        )
        .await
        .unwrap_err();

        assert_eq!(err.reason(), "quota_exceeded");
        assert_eq!(sync.get(ITEMS_KEY).await.unwrap(), None);
        assert_eq!(local.get(ITEMS_KEY).await.unwrap(), Some(Value::Array(big)));
        assert_eq!(
            local.get(STORAGE_MODE_KEY).await.unwrap(),
            Some(json!("local"))
        );
    }

    #[tokio::test]
    async fn selector_failure_restores_target() {
        let sync = Arc::new(MemoryBackend::new("sync"));
        let mut flaky = FlakyBackend::new("local");
        flaky.fail_set_key = Some(STORAGE_MODE_KEY);
        let local = Arc::new(flaky);
        sync.set(ITEMS_KEY, json!([{ "id": "S", "timestamp": 1, "value": "s" }]))
            .await
            .unwrap();
        local
            .set(ITEMS_KEY, json!([{ "id": "L", "timestamp": 2, "value": "l" }]))
            .await
            .unwrap();
        let backends = Backends::new(sync.clone(), local.clone());

        let err = switch_storage(
            &backends,
            StorageMode::Sync,
            StorageMode::Local,
            100,
            NOW,
            &NullNotifier,
        )
        .await
        .unwrap_err();

        assert_eq!(err.reason(), "backend_failure");
        assert_eq!(
            local.get(ITEMS_KEY).await.unwrap(),
            Some(json!([{ "id": "L", "timestamp": 2, "value": "l" }]))
        );
    }

    #[tokio::test]
    async fn switching_twice_is_stable() {
        let sync = Arc::new(MemoryBackend::new("sync"));
        let local = Arc::new(MemoryBackend::new("local"));
        sync.set(
            ITEMS_KEY,
            json!([
                { "value": "no id yet", "timestamp": 3 },
                { "id": "P", "value": "pinned", "timestamp": 1, "isPinned": true },
            ]),
        )
        .await
        .unwrap();
        let backends = Backends::new(sync.clone(), local.clone());

        let first = switch_storage(
            &backends,
            StorageMode::Sync,
            StorageMode::Local,
            100,
            NOW,
            &NullNotifier,
        )
        .await
        .unwrap();
        let second = switch_storage(
            &backends,
            StorageMode::Local,
            StorageMode::Local,
            100,
            NOW,
            &NullNotifier,
        )
        .await
        .unwrap();
        let back = switch_storage(
            &backends,
            StorageMode::Local,
            StorageMode::Sync,
            100,
            NOW,
            &NullNotifier,
        )
        .await
        .unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
        assert_eq!(first, back);
        assert_eq!(
            local.get(STORAGE_MODE_KEY).await.unwrap(),
            Some(json!("sync"))
        );
    }

    #[tokio::test]
    async fn theme_follows_the_switch() {
        let sync = Arc::new(MemoryBackend::new("sync"));
        let local = Arc::new(MemoryBackend::new("local"));
        sync.set(THEME_KEY, json!(["#4CAF50"])).await.unwrap();
        let backends = Backends::new(sync.clone(), local.clone());

        switch_storage(
            &backends,
            StorageMode::Sync,
            StorageMode::Local,
            100,
            NOW,
            &NullNotifier,
        )
        .await
        .unwrap();

        assert_eq!(local.get(THEME_KEY).await.unwrap(), Some(json!(["#4CAF50"])));
        assert_eq!(sync.get(THEME_KEY).await.unwrap(), Some(json!(["#4CAF50"])));
    }

    #[tokio::test]
    async fn same_mode_switch_keeps_target_theme() {
        let sync = Arc::new(MemoryBackend::new("sync"));
        let local = Arc::new(MemoryBackend::new("local"));
        sync.set(THEME_KEY, json!(["#4CAF50"])).await.unwrap();
        local.set(THEME_KEY, json!(["#F44336"])).await.unwrap();
        let backends = Backends::new(sync.clone(), local.clone());

        switch_storage(
            &backends,
            StorageMode::Local,
            StorageMode::Local,
            100,
            NOW,
            &NullNotifier,
        )
        .await
        .unwrap();

        assert_eq!(local.get(THEME_KEY).await.unwrap(), Some(json!(["#F44336"])));
    }

    #[tokio::test]
    async fn selector_failure_restores_target_theme() {
        let sync = Arc::new(MemoryBackend::new("sync"));
        let mut flaky = FlakyBackend::new("local");
        flaky.fail_set_key = Some(STORAGE_MODE_KEY);
        let local = Arc::new(flaky);
        sync.set(THEME_KEY, json!(["#4CAF50"])).await.unwrap();
        local.set(THEME_KEY, json!(["#F44336"])).await.unwrap();
        let backends = Backends::new(sync.clone(), local.clone());

        switch_storage(
            &backends,
            StorageMode::Sync,
            StorageMode::Local,
            100,
            NOW,
            &NullNotifier,
        )
        .await
        .unwrap_err();

        assert_eq!(local.get(THEME_KEY).await.unwrap(), Some(json!(["#F44336"])));
        assert_eq!(local.get(ITEMS_KEY).await.unwrap(), None);
    }
}
