//! Message dispatch and request handling.
//!
//! Each handler takes a mutable reference to [`DaemonState`] and returns
//! the response message. Failures become `status: error` responses with a
//! machine-readable reason; nothing here closes a connection.

use crate::backend::BackendError;
use crate::ipc::protocol::{Message, PROTOCOL_VERSION, Role, SettingsDescriptor, Status};
use crate::settings::{StorageMode, ThemePreset};
use crate::store::menu::{MENU_UNPINNED_LIMIT, MenuItem, paste_menu};
use crate::store::{Entry, EntryKind, StoreError};

use super::state::{ConnectionId, DaemonState};

/// Dispatch a request message to the appropriate handler.
///
/// Server-originated variants sent by a client get `unknown_type`.
pub async fn handle_message(
    state: &mut DaemonState,
    request: Message,
    connection_id: ConnectionId,
) -> Message {
    match request {
        Message::Hello { id, version, role } => handle_hello(state, id, version, role, connection_id),
        Message::Insert { id, value, kind } => handle_insert(state, id, value, kind).await,
        Message::Delete { id, entry_id } => handle_delete(state, id, &entry_id).await,
        Message::TogglePin { id, entry_id } => handle_toggle_pin(state, id, &entry_id).await,
        Message::ClearAll { id } => handle_clear_all(state, id).await,
        Message::ListItems { id, limit } => handle_list_items(state, id, limit).await,
        Message::GetItem { id, entry_id } => handle_get_item(state, id, &entry_id).await,
        Message::PasteMenu { id } => handle_paste_menu(state, id).await,
        Message::SwitchStorage { id, mode } => handle_switch_storage(state, id, mode).await,
        Message::GetSettings { id } => handle_get_settings(state, id).await,
        Message::SetTheme { id, preset } => handle_set_theme(state, id, &preset).await,
        Message::HelloAck { id, .. } | Message::Response { id, .. } | Message::Notify { id, .. } => {
            error_response(id, "unknown_type")
        }
    }
}

// -- Individual handlers --

fn handle_hello(
    state: &mut DaemonState,
    id: u32,
    version: u32,
    role: Role,
    connection_id: ConnectionId,
) -> Message {
    // Handshake id is always 0.
    if id != 0 {
        return hello_ack_error("invalid_hello_id");
    }
    if version != PROTOCOL_VERSION {
        return hello_ack_error("version_mismatch");
    }
    state.add_connection(connection_id, role);
    Message::HelloAck {
        id: 0,
        status: Status::Ok,
        error: None,
    }
}

async fn handle_insert(state: &mut DaemonState, id: u32, value: String, kind: EntryKind) -> Message {
    match state.store().insert(value, kind).await {
        Ok(entry) => ok_with(
            id,
            Body {
                entry: Some(entry),
                ..Body::default()
            },
        ),
        Err(e) => store_failure(id, "insert", e),
    }
}

async fn handle_delete(state: &mut DaemonState, id: u32, entry_id: &str) -> Message {
    match state.store().delete(entry_id).await {
        Ok(removed) => ok_with(
            id,
            Body {
                removed: Some(removed),
                ..Body::default()
            },
        ),
        Err(e) => store_failure(id, "delete", e),
    }
}

async fn handle_toggle_pin(state: &mut DaemonState, id: u32, entry_id: &str) -> Message {
    match state.store().toggle_pin(entry_id).await {
        Ok(entry) => ok_with(
            id,
            Body {
                entry: Some(entry),
                ..Body::default()
            },
        ),
        Err(e) => store_failure(id, "toggle_pin", e),
    }
}

async fn handle_clear_all(state: &mut DaemonState, id: u32) -> Message {
    match state.store().clear_all().await {
        Ok(()) => ok_response(id),
        Err(e) => store_failure(id, "clear_all", e),
    }
}

async fn handle_list_items(state: &mut DaemonState, id: u32, limit: Option<u32>) -> Message {
    match state.store().entries().await {
        Ok(mut entries) => {
            if let Some(limit) = limit {
                entries.truncate(limit as usize);
            }
            ok_with(
                id,
                Body {
                    entries: Some(entries),
                    ..Body::default()
                },
            )
        }
        Err(e) => store_failure(id, "list_items", e),
    }
}

async fn handle_get_item(state: &mut DaemonState, id: u32, entry_id: &str) -> Message {
    match state.store().get(entry_id).await {
        Ok(Some(entry)) => ok_with(
            id,
            Body {
                entry: Some(entry),
                ..Body::default()
            },
        ),
        Ok(None) => error_response(id, "not_found"),
        Err(e) => store_failure(id, "get_item", e),
    }
}

async fn handle_paste_menu(state: &mut DaemonState, id: u32) -> Message {
    match state.store().entries().await {
        Ok(entries) => ok_with(
            id,
            Body {
                menu: Some(paste_menu(&entries, MENU_UNPINNED_LIMIT)),
                ..Body::default()
            },
        ),
        Err(e) => store_failure(id, "paste_menu", e),
    }
}

async fn handle_switch_storage(state: &mut DaemonState, id: u32, mode: StorageMode) -> Message {
    match state.switch_storage(mode).await {
        Ok(entries) => ok_with(
            id,
            Body {
                entries: Some(entries),
                ..Body::default()
            },
        ),
        Err(e) => store_failure(id, "switch_storage", e),
    }
}

async fn handle_get_settings(state: &mut DaemonState, id: u32) -> Message {
    match state.settings().await {
        Ok(settings) => settings_response(id, settings),
        Err(e) => backend_failure(id, "get_settings", e),
    }
}

async fn handle_set_theme(state: &mut DaemonState, id: u32, preset: &str) -> Message {
    let Some(preset) = ThemePreset::from_name(preset) else {
        return error_response(id, "unknown_theme");
    };
    match state.set_theme(preset).await {
        Ok(settings) => settings_response(id, settings),
        Err(e) => backend_failure(id, "set_theme", e),
    }
}

// -- Response helpers --

/// Optional payload fields of a [`Message::Response`].
#[derive(Default)]
struct Body {
    entry: Option<Entry>,
    entries: Option<Vec<Entry>>,
    menu: Option<Vec<MenuItem>>,
    removed: Option<bool>,
    settings: Option<SettingsDescriptor>,
}

fn ok_with(id: u32, body: Body) -> Message {
    Message::Response {
        id,
        status: Status::Ok,
        error: None,
        entry: body.entry,
        entries: body.entries,
        menu: body.menu,
        removed: body.removed,
        settings: body.settings,
    }
}

fn ok_response(id: u32) -> Message {
    ok_with(id, Body::default())
}

fn settings_response(id: u32, settings: SettingsDescriptor) -> Message {
    ok_with(
        id,
        Body {
            settings: Some(settings),
            ..Body::default()
        },
    )
}

pub(super) fn error_response(id: u32, reason: &str) -> Message {
    Message::Response {
        id,
        status: Status::Error,
        error: Some(reason.into()),
        entry: None,
        entries: None,
        menu: None,
        removed: None,
        settings: None,
    }
}

fn hello_ack_error(reason: &str) -> Message {
    Message::HelloAck {
        id: 0,
        status: Status::Error,
        error: Some(reason.into()),
    }
}

fn store_failure(id: u32, op: &'static str, e: StoreError) -> Message {
    match e {
        StoreError::NotFound(_) | StoreError::BlankValue => {
            tracing::debug!(op, error = %e, "request rejected");
        }
        StoreError::Backend(_) => {
            tracing::error!(op, error = %e, "request failed");
        }
    }
    error_response(id, e.reason())
}

fn backend_failure(id: u32, op: &'static str, e: BackendError) -> Message {
    store_failure(id, op, StoreError::from(e))
}
