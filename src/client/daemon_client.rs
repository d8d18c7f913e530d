//! Daemon client for the CLI.
//!
//! Connects to the daemon, performs the handshake, and provides one
//! method per request type.

use futures::{SinkExt, StreamExt};
use tokio::net::UnixStream;
use tokio_util::codec::Framed;

use crate::ipc::codec::LengthPrefixedCodec;
use crate::ipc::protocol::{Message, PROTOCOL_VERSION, Role, SettingsDescriptor, Status};
use crate::notify::StoreEvent;
use crate::settings::StorageMode;
use crate::store::menu::MenuItem;
use crate::store::{Entry, EntryKind};

use super::ClientError;

/// Payload of a successful response.
#[derive(Debug, Default)]
struct Reply {
    entry: Option<Entry>,
    entries: Option<Vec<Entry>>,
    menu: Option<Vec<MenuItem>>,
    removed: Option<bool>,
    settings: Option<SettingsDescriptor>,
}

/// Daemon client for one-shot CLI commands and `watch`.
pub struct DaemonClient {
    framed: Framed<UnixStream, LengthPrefixedCodec>,
    next_id: u32,
}

impl DaemonClient {
    /// Connect to the daemon socket and perform the handshake.
    pub async fn connect(role: Role) -> Result<Self, ClientError> {
        let socket_path =
            crate::daemon::resolve_socket_path().map_err(|e| ClientError::Daemon(e.to_string()))?;
        let stream = UnixStream::connect(&socket_path)
            .await
            .map_err(|e| ClientError::Daemon(format!("connect {}: {e}", socket_path.display())))?;
        Self::handshake(stream, role).await
    }

    async fn handshake(stream: UnixStream, role: Role) -> Result<Self, ClientError> {
        let mut framed = Framed::new(stream, LengthPrefixedCodec::new());
        framed
            .send(Message::Hello {
                id: 0,
                version: PROTOCOL_VERSION,
                role,
            })
            .await
            .map_err(|e| ClientError::Daemon(format!("send hello: {e}")))?;

        match framed.next().await {
            Some(Ok(Message::HelloAck {
                status: Status::Ok, ..
            })) => {}
            Some(Ok(Message::HelloAck {
                status: Status::Error,
                error,
                ..
            })) => {
                return Err(ClientError::Daemon(format!(
                    "handshake rejected: {}",
                    error.unwrap_or_default()
                )));
            }
            other => {
                return Err(ClientError::Daemon(format!(
                    "unexpected handshake response: {other:?}"
                )));
            }
        }

        Ok(Self {
            framed,
            next_id: 1, // 0 = Hello
        })
    }

    pub async fn insert(&mut self, value: String, kind: EntryKind) -> Result<Entry, ClientError> {
        let reply = self
            .call("insert", |id| Message::Insert { id, value, kind })
            .await?;
        reply
            .entry
            .ok_or_else(|| ClientError::Daemon("insert: response missing entry".into()))
    }

    /// Returns whether anything was removed.
    pub async fn delete(&mut self, entry_id: String) -> Result<bool, ClientError> {
        let reply = self
            .call("delete", |id| Message::Delete { id, entry_id })
            .await?;
        Ok(reply.removed.unwrap_or(false))
    }

    pub async fn toggle_pin(&mut self, entry_id: String) -> Result<Entry, ClientError> {
        let reply = self
            .call("toggle_pin", |id| Message::TogglePin { id, entry_id })
            .await?;
        reply
            .entry
            .ok_or_else(|| ClientError::Daemon("toggle_pin: response missing entry".into()))
    }

    pub async fn clear_all(&mut self) -> Result<(), ClientError> {
        self.call("clear_all", |id| Message::ClearAll { id }).await?;
        Ok(())
    }

    pub async fn list(&mut self, limit: Option<u32>) -> Result<Vec<Entry>, ClientError> {
        let reply = self
            .call("list_items", |id| Message::ListItems { id, limit })
            .await?;
        Ok(reply.entries.unwrap_or_default())
    }

    pub async fn get(&mut self, entry_id: String) -> Result<Entry, ClientError> {
        let reply = self
            .call("get_item", |id| Message::GetItem { id, entry_id })
            .await?;
        reply
            .entry
            .ok_or_else(|| ClientError::Daemon("get_item: response missing entry".into()))
    }

    pub async fn paste_menu(&mut self) -> Result<Vec<MenuItem>, ClientError> {
        let reply = self.call("paste_menu", |id| Message::PasteMenu { id }).await?;
        Ok(reply.menu.unwrap_or_default())
    }

    /// Returns the merged collection now active.
    pub async fn switch_storage(&mut self, mode: StorageMode) -> Result<Vec<Entry>, ClientError> {
        let reply = self
            .call("switch_storage", |id| Message::SwitchStorage { id, mode })
            .await?;
        Ok(reply.entries.unwrap_or_default())
    }

    pub async fn settings(&mut self) -> Result<SettingsDescriptor, ClientError> {
        let reply = self.call("get_settings", |id| Message::GetSettings { id }).await?;
        reply
            .settings
            .ok_or_else(|| ClientError::Daemon("get_settings: response missing settings".into()))
    }

    pub async fn set_theme(&mut self, preset: String) -> Result<SettingsDescriptor, ClientError> {
        let reply = self
            .call("set_theme", |id| Message::SetTheme { id, preset })
            .await?;
        reply
            .settings
            .ok_or_else(|| ClientError::Daemon("set_theme: response missing settings".into()))
    }

    /// Wait for the next store event. `None` when the daemon closes the
    /// connection. Only meaningful on a [`Role::Watcher`] connection.
    pub async fn next_event(&mut self) -> Result<Option<StoreEvent>, ClientError> {
        match self.framed.next().await {
            Some(Ok(Message::Notify { event, .. })) => Ok(Some(event)),
            None => Ok(None),
            other => Err(ClientError::Daemon(format!(
                "unexpected message while watching: {other:?}"
            ))),
        }
    }

    async fn call(
        &mut self,
        op: &str,
        build: impl FnOnce(u32) -> Message,
    ) -> Result<Reply, ClientError> {
        let id = self.next_id;
        self.next_id += 1;

        self.framed
            .send(build(id))
            .await
            .map_err(|e| ClientError::Daemon(format!("send {op}: {e}")))?;

        match self.framed.next().await {
            Some(Ok(Message::Response {
                status: Status::Ok,
                entry,
                entries,
                menu,
                removed,
                settings,
                ..
            })) => Ok(Reply {
                entry,
                entries,
                menu,
                removed,
                settings,
            }),
            Some(Ok(Message::Response { error, .. })) => Err(ClientError::Daemon(format!(
                "{op} failed: {}",
                error.unwrap_or_default()
            ))),
            other => Err(ClientError::Daemon(format!(
                "unexpected {op} response: {other:?}"
            ))),
        }
    }
}
