//! Clipboard history daemon.
//!
//! Owns both storage backends and the active item store. Listens on a
//! Unix domain socket and applies client requests one at a time.
//!
//! Architecture: channel-based actor. A single daemon loop owns all
//! mutable state ([`state::DaemonState`]). Per-connection tasks forward
//! commands via mpsc channels. Store events are fanned out to watcher
//! connections via per-connection channels.

mod connection;
mod handler;
pub mod state;

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;

use connection::{DaemonCommand, DisconnectNotice};
use state::{ConnectionId, DaemonState};

use crate::backend::{
    BackendError, Backends, JsonFileBackend, LOCAL_QUOTA_BYTES, SYNC_QUOTA_BYTES,
};
use crate::clock::SystemClock;
use crate::ipc::protocol::Message;
use crate::notify::{ChannelNotifier, StoreEvent};
use crate::store::{DEFAULT_MAX_ITEMS, StoreConfig};

/// Daemon startup/runtime errors.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("$XDG_RUNTIME_DIR is not set")]
    NoRuntimeDir,
    #[error("daemon already running at {0}")]
    AlreadyRunning(PathBuf),
    #[error("failed to create directory {path}: {source}")]
    MkdirFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to bind socket {path}: {source}")]
    BindFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to open storage: {0}")]
    Storage(#[from] BackendError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Daemon settings from the command line.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Directory holding `sync.json` and `local.json`.
    pub data_dir: PathBuf,
    pub max_items: usize,
    pub sync_quota_bytes: usize,
    pub local_quota_bytes: usize,
}

impl DaemonConfig {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            max_items: DEFAULT_MAX_ITEMS,
            sync_quota_bytes: SYNC_QUOTA_BYTES,
            local_quota_bytes: LOCAL_QUOTA_BYTES,
        }
    }

    /// File-backed sync and local backends under `data_dir`.
    pub fn backends(&self) -> Backends {
        Backends::new(
            Arc::new(JsonFileBackend::new(
                "sync",
                self.data_dir.join("sync.json"),
                Some(self.sync_quota_bytes),
            )),
            Arc::new(JsonFileBackend::new(
                "local",
                self.data_dir.join("local.json"),
                Some(self.local_quota_bytes),
            )),
        )
    }
}

/// Run the daemon until SIGTERM or SIGINT.
///
/// - Socket at `$XDG_RUNTIME_DIR/clipstash/daemon.sock` (mode 0700)
/// - Stale socket detection and cleanup
/// - Both collections migrated to canonical form before listening
/// - SIGTERM/SIGINT → graceful shutdown, socket file removed
///
/// # Errors
///
/// Returns `DaemonError` if `$XDG_RUNTIME_DIR` is unset, the backends
/// cannot be read, socket bind fails, or another daemon is already
/// running.
pub async fn run(config: DaemonConfig) -> Result<(), DaemonError> {
    let socket_path = resolve_socket_path()?;
    // Bind before touching storage: a second daemon must not migrate
    // files the first one is serving.
    let listener = bind_socket(&socket_path).await?;

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let opened = DaemonState::open(
        config.backends(),
        Arc::new(ChannelNotifier::new(event_tx)),
        Arc::new(SystemClock),
        StoreConfig {
            max_items: config.max_items,
        },
    )
    .await;
    let state = match opened {
        Ok(state) => state,
        Err(e) => {
            drop(listener);
            let _ = std::fs::remove_file(&socket_path);
            return Err(e.into());
        }
    };

    tracing::info!(
        path = %socket_path.display(),
        data_dir = %config.data_dir.display(),
        "daemon listening"
    );

    // Graceful shutdown on SIGTERM or SIGINT.
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?;
    let shutdown = async move {
        tokio::select! {
            _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
            _ = sigint.recv() => tracing::info!("received SIGINT, shutting down"),
        }
    };

    serve(listener, state, event_rx, shutdown).await;

    if let Err(e) = std::fs::remove_file(&socket_path) {
        tracing::warn!(error = %e, path = %socket_path.display(), "failed to remove socket");
    }
    tracing::info!("daemon stopped");
    Ok(())
}

/// The daemon loop. Returns when `shutdown` completes; the listener is
/// dropped on return.
pub async fn serve(
    listener: UnixListener,
    mut state: DaemonState,
    mut event_rx: mpsc::UnboundedReceiver<StoreEvent>,
    shutdown: impl Future<Output = ()>,
) {
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<DaemonCommand>();
    let (disconnect_tx, mut disconnect_rx) = mpsc::unbounded_channel::<DisconnectNotice>();

    // Per-connection channels for notification delivery.
    let mut notify_senders: HashMap<ConnectionId, mpsc::UnboundedSender<Message>> = HashMap::new();

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            // -- New connection --
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        accept_connection(stream, &cmd_tx, &disconnect_tx, &mut notify_senders);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                    }
                }
            }

            // -- Command from connection task --
            Some(cmd) = cmd_rx.recv() => {
                let response = handler::handle_message(
                    &mut state,
                    cmd.request,
                    cmd.connection_id,
                )
                .await;
                let _ = cmd.response_tx.send(response);
            }

            // -- Store event --
            Some(event) = event_rx.recv() => {
                broadcast(&state, &notify_senders, event);
            }

            // -- Connection disconnected --
            Some(notice) = disconnect_rx.recv() => {
                let conn_id = notice.connection_id;
                notify_senders.remove(&conn_id);
                state.remove_connection(conn_id);
                tracing::debug!(?conn_id, "connection cleaned up");
            }

            () = &mut shutdown => break,
        }
    }
}

/// Accept a new connection: create channels and spawn handler task.
fn accept_connection(
    stream: UnixStream,
    cmd_tx: &mpsc::UnboundedSender<DaemonCommand>,
    disconnect_tx: &mpsc::UnboundedSender<DisconnectNotice>,
    notify_senders: &mut HashMap<ConnectionId, mpsc::UnboundedSender<Message>>,
) {
    let conn_id = ConnectionId::new();
    let (notify_tx, notify_rx) = mpsc::unbounded_channel();
    notify_senders.insert(conn_id, notify_tx);

    connection::spawn_connection(
        stream,
        conn_id,
        cmd_tx.clone(),
        notify_rx,
        disconnect_tx.clone(),
    );

    tracing::debug!(?conn_id, "accepted connection");
}

/// Deliver a store event to every watcher connection.
fn broadcast(
    state: &DaemonState,
    notify_senders: &HashMap<ConnectionId, mpsc::UnboundedSender<Message>>,
    event: StoreEvent,
) {
    let mut delivered = 0usize;
    for conn_id in state.watchers() {
        let Some(tx) = notify_senders.get(&conn_id) else {
            continue;
        };
        let msg = Message::Notify {
            id: 0,
            event: event.clone(),
        };
        if tx.send(msg).is_err() {
            tracing::debug!(?conn_id, "notify send failed, watcher disconnected");
        } else {
            delivered += 1;
        }
    }
    tracing::debug!(?event, delivered, "store event broadcast");
}

// -- Paths --

/// Resolve the daemon socket path from `$XDG_RUNTIME_DIR`.
pub fn resolve_socket_path() -> Result<PathBuf, DaemonError> {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR").map_err(|_| DaemonError::NoRuntimeDir)?;
    Ok(PathBuf::from(runtime_dir)
        .join("clipstash")
        .join("daemon.sock"))
}

/// `$XDG_DATA_HOME/clipstash`, else `~/.local/share/clipstash`.
pub fn default_data_dir() -> Option<PathBuf> {
    let base = match std::env::var_os("XDG_DATA_HOME") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => PathBuf::from(std::env::var_os("HOME")?)
            .join(".local")
            .join("share"),
    };
    Some(base.join("clipstash"))
}

/// Create the socket directory and bind the Unix listener.
///
/// Handles stale socket detection: if EADDRINUSE, attempts to connect
/// to the existing socket. If the connection succeeds, another daemon
/// is running. If it fails, the socket is stale and is removed.
async fn bind_socket(path: &Path) -> Result<UnixListener, DaemonError> {
    let Some(parent) = path.parent() else {
        return Err(DaemonError::BindFailed {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "socket path has no parent"),
        });
    };
    if !parent.exists() {
        std::fs::create_dir_all(parent).map_err(|e| DaemonError::MkdirFailed {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    // Always enforce 0700, even if the directory already existed.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o700)).map_err(|e| {
            DaemonError::MkdirFailed {
                path: parent.to_path_buf(),
                source: e,
            }
        })?;
    }

    match UnixListener::bind(path) {
        Ok(listener) => Ok(listener),
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => match UnixStream::connect(path).await {
            Ok(_) => Err(DaemonError::AlreadyRunning(path.to_path_buf())),
            Err(_) => {
                tracing::info!(path = %path.display(), "removing stale socket");
                std::fs::remove_file(path).map_err(|e| DaemonError::BindFailed {
                    path: path.to_path_buf(),
                    source: e,
                })?;
                UnixListener::bind(path).map_err(|e| DaemonError::BindFailed {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        },
        Err(e) => Err(DaemonError::BindFailed {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}
