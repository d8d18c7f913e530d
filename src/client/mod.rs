//! CLI client for daemon operations.
//!
//! One-shot commands connect to the daemon, perform a single request,
//! print the result, and exit. `watch` stays connected as a watcher and
//! prints every store event.

mod daemon_client;
mod format;

use crate::cli::ClientAction;
use crate::ipc::protocol::Role;
use crate::store::EntryKind;
use daemon_client::DaemonClient;

/// Client error type.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("daemon: {0}")]
    Daemon(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run the client command.
///
/// Called from `main.rs` for `Command::Client`.
pub async fn run(action: ClientAction) -> Result<(), ClientError> {
    let role = match action {
        ClientAction::Watch => Role::Watcher,
        _ => Role::Client,
    };
    let mut daemon = DaemonClient::connect(role).await?;

    match action {
        ClientAction::Add { value, image } => {
            let kind = if image { EntryKind::Image } else { EntryKind::Text };
            let entry = daemon.insert(value, kind).await?;
            format::print_inserted(&entry);
        }
        ClientAction::Delete { entry_id } => {
            let removed = daemon.delete(entry_id.clone()).await?;
            format::print_deleted(&entry_id, removed);
        }
        ClientAction::Pin { entry_id } => {
            let entry = daemon.toggle_pin(entry_id).await?;
            format::print_pin(&entry);
        }
        ClientAction::Clear => {
            daemon.clear_all().await?;
            format::print_cleared();
        }
        ClientAction::List { limit } => {
            let entries = daemon.list(limit).await?;
            format::print_entries(&entries);
        }
        ClientAction::Get { entry_id } => {
            let entry = daemon.get(entry_id).await?;
            format::print_entry(&entry)?;
        }
        ClientAction::Menu => {
            let menu = daemon.paste_menu().await?;
            format::print_menu(&menu);
        }
        ClientAction::Switch { mode } => {
            let entries = daemon.switch_storage(mode).await?;
            format::print_switched(mode, &entries);
        }
        ClientAction::Settings => {
            let settings = daemon.settings().await?;
            format::print_settings(&settings);
        }
        ClientAction::Theme { preset } => {
            let settings = daemon.set_theme(preset).await?;
            format::print_settings(&settings);
        }
        ClientAction::Watch => {
            while let Some(event) = daemon.next_event().await? {
                format::print_event(&event);
            }
            tracing::info!("daemon closed the connection");
        }
    }

    Ok(())
}
