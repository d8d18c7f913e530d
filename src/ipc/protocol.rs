//! Wire protocol message types for daemon IPC.
//!
//! All messages are MessagePack-encoded maps with at minimum `type` and `id`
//! fields.

use serde::{Deserialize, Serialize};

use crate::notify::StoreEvent;
use crate::settings::{ImageStorageMode, StorageMode};
use crate::store::EntryKind;
use crate::store::entry::Entry;
use crate::store::menu::MenuItem;

/// All wire protocol messages.
///
/// Serialized as a tagged union on the `type` field via MessagePack.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Message {
    // -- Handshake --
    #[serde(rename = "hello")]
    Hello { id: u32, version: u32, role: Role },

    #[serde(rename = "hello_ack")]
    HelloAck {
        id: u32,
        status: Status,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    // -- Mutations --
    #[serde(rename = "insert")]
    Insert {
        id: u32,
        value: String,
        #[serde(default)]
        kind: EntryKind,
    },

    #[serde(rename = "delete")]
    Delete { id: u32, entry_id: String },

    #[serde(rename = "toggle_pin")]
    TogglePin { id: u32, entry_id: String },

    #[serde(rename = "clear_all")]
    ClearAll { id: u32 },

    // -- Queries --
    #[serde(rename = "list_items")]
    ListItems {
        id: u32,
        #[serde(default)]
        limit: Option<u32>,
    },

    #[serde(rename = "get_item")]
    GetItem { id: u32, entry_id: String },

    #[serde(rename = "paste_menu")]
    PasteMenu { id: u32 },

    // -- Settings --
    #[serde(rename = "switch_storage")]
    SwitchStorage { id: u32, mode: StorageMode },

    #[serde(rename = "get_settings")]
    GetSettings { id: u32 },

    #[serde(rename = "set_theme")]
    SetTheme { id: u32, preset: String },

    // -- Unsolicited (daemon → watcher) --
    #[serde(rename = "notify")]
    Notify { id: u32, event: StoreEvent },

    // -- Generic response --
    #[serde(rename = "response")]
    Response {
        id: u32,
        status: Status,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        entry: Option<Entry>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        entries: Option<Vec<Entry>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        menu: Option<Vec<MenuItem>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        removed: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        settings: Option<SettingsDescriptor>,
    },
}

/// Connection role in the handshake.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Request/response only.
    Client,
    /// Additionally receives `notify` messages for every store event.
    Watcher,
}

/// Response status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Error,
}

/// Current settings, returned by `get_settings` and `set_theme`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SettingsDescriptor {
    pub storage_mode: StorageMode,
    pub image_storage_mode: ImageStorageMode,
    pub theme: Vec<String>,
    /// Icon colour name derived from the theme's primary token.
    pub icon: String,
    pub max_items: u32,
}

/// Protocol version.
pub const PROTOCOL_VERSION: u32 = 1;

/// Maximum payload size (16 MiB).
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Minimal envelope for extracting `{type, id}` from unknown messages.
///
/// Used by the daemon as a fallback when [`Message`] deserialization
/// fails (e.g., unknown `type` tag), so the error response can echo the
/// request `id`.
#[derive(Debug, Deserialize)]
pub struct RawEnvelope {
    /// Consumed by serde for structural matching; not read by daemon code.
    #[serde(rename = "type")]
    #[allow(dead_code)]
    pub msg_type: String,
    pub id: u32,
}
