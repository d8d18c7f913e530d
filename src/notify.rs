//! Store events and the notification sink they are sent through.
//!
//! Delivery is fire-and-forget: a mutation that has been persisted stays
//! persisted whether or not anyone hears about it.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::settings::StorageMode;

/// Something observers of the store should re-render for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StoreEvent {
    /// The persisted collection changed.
    ItemsChanged,
    /// The active backend changed.
    StorageModeChanged { mode: StorageMode },
    /// The theme tokens changed.
    ThemeChanged,
}

/// Notification sink.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: StoreEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _event: StoreEvent) {}
}

/// Forwards events into an unbounded channel (the daemon loop fans them
/// out to watcher connections).
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<StoreEvent>,
}

impl ChannelNotifier {
    pub fn new(tx: mpsc::UnboundedSender<StoreEvent>) -> Self {
        Self { tx }
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, event: StoreEvent) {
        if let Err(e) = self.tx.send(event) {
            tracing::debug!(event = ?e.0, "notification dropped, receiver closed");
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Records every event, for assertions.
    #[derive(Debug, Default)]
    pub struct RecordingNotifier {
        events: Mutex<Vec<StoreEvent>>,
    }

    impl RecordingNotifier {
        pub fn events(&self) -> Vec<StoreEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, event: StoreEvent) {
            self.events.lock().unwrap().push(event);
        }
    }
}
