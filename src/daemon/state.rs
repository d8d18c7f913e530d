//! Daemon state: backends, the active item store, connection roles.
//!
//! Owned exclusively by the daemon loop. Requests are applied one at a
//! time, so every read-modify-write on a backend sees the previous one.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::backend::{Backend, BackendError, Backends};
use crate::clock::Clock;
use crate::ipc::protocol::{Role, SettingsDescriptor};
use crate::notify::{Notifier, StoreEvent};
use crate::settings::{self, StorageMode, ThemePreset};
use crate::store::{Entry, ItemStore, StoreConfig, StoreError, switch_storage};

/// Unique identifier for a client connection.
///
/// Monotonically increasing counter. Used to route notifications to
/// watcher connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

pub struct DaemonState {
    backends: Backends,
    mode: StorageMode,
    store: ItemStore,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    config: StoreConfig,
    /// Handshaken connections and the role each announced.
    connections: HashMap<ConnectionId, Role>,
}

impl DaemonState {
    /// Resolve the storage mode, bring both collections to canonical form,
    /// and make sure a theme is stored.
    ///
    /// A backend whose migration fails is logged and left as it was; the
    /// store still serves it, repairing on read.
    pub async fn open(
        backends: Backends,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        config: StoreConfig,
    ) -> Result<Self, BackendError> {
        let mode = settings::resolve_storage_mode(backends.local.as_ref()).await?;

        for backend in [&backends.sync, &backends.local] {
            let store = ItemStore::new(backend.clone(), notifier.clone(), clock.clone(), config);
            match store.migrate().await {
                Ok(true) => tracing::info!(backend = backend.name(), "startup migration rewrote collection"),
                Ok(false) => {}
                Err(e) => tracing::warn!(backend = backend.name(), error = %e, "startup migration failed"),
            }
        }

        let store = ItemStore::new(backends.for_mode(mode), notifier.clone(), clock.clone(), config);
        settings::retrieve_theme(store.backend().as_ref()).await?;

        tracing::info!(%mode, max_items = config.max_items, "daemon state ready");
        Ok(Self {
            backends,
            mode,
            store,
            notifier,
            clock,
            config,
            connections: HashMap::new(),
        })
    }

    pub fn store(&self) -> &ItemStore {
        &self.store
    }

    pub fn mode(&self) -> StorageMode {
        self.mode
    }

    /// Register a handshaken connection.
    pub fn add_connection(&mut self, id: ConnectionId, role: Role) {
        self.connections.insert(id, role);
    }

    pub fn remove_connection(&mut self, id: ConnectionId) {
        self.connections.remove(&id);
    }

    #[cfg(test)]
    pub(crate) fn is_connected(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Connections that asked for notifications.
    pub fn watchers(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.connections
            .iter()
            .filter(|(_, role)| **role == Role::Watcher)
            .map(|(id, _)| *id)
    }

    /// Merge both backends into `target` and make it the active store.
    ///
    /// On failure the active mode and store are unchanged.
    pub async fn switch_storage(&mut self, target: StorageMode) -> Result<Vec<Entry>, StoreError> {
        let merged = switch_storage(
            &self.backends,
            self.mode,
            target,
            self.config.max_items,
            self.clock.now_millis(),
            self.notifier.as_ref(),
        )
        .await?;
        self.mode = target;
        self.store = ItemStore::new(
            self.backends.for_mode(target),
            self.notifier.clone(),
            self.clock.clone(),
            self.config,
        );
        Ok(merged)
    }

    /// Current settings as seen by clients.
    pub async fn settings(&self) -> Result<SettingsDescriptor, BackendError> {
        let image_storage_mode =
            settings::resolve_image_storage_mode(self.backends.local.as_ref(), self.mode).await?;
        let theme = settings::retrieve_theme(self.store.backend().as_ref()).await?;
        let icon = settings::icon_color_name(&theme).to_string();
        Ok(SettingsDescriptor {
            storage_mode: self.mode,
            image_storage_mode,
            theme,
            icon,
            max_items: u32::try_from(self.config.max_items).unwrap_or(u32::MAX),
        })
    }

    /// Store `preset` on the active backend.
    pub async fn set_theme(&self, preset: ThemePreset) -> Result<SettingsDescriptor, BackendError> {
        settings::save_theme(self.store.backend().as_ref(), preset).await?;
        tracing::info!(?preset, "theme changed");
        self.notifier.notify(StoreEvent::ThemeChanged);
        self.settings().await
    }
}
