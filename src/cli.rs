use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::backend::{LOCAL_QUOTA_BYTES, SYNC_QUOTA_BYTES};
use crate::settings::StorageMode;
use crate::store::DEFAULT_MAX_ITEMS;

#[derive(Parser)]
#[command(name = "clipstash", about = "Clipboard history with pinning and two storage backends")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the history daemon
    Daemon {
        /// Maximum number of entries kept in a collection
        #[arg(long, default_value_t = DEFAULT_MAX_ITEMS)]
        max_items: usize,

        /// Directory holding the sync and local stores
        /// [default: $XDG_DATA_HOME/clipstash]
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Size limit of the sync store in bytes
        #[arg(long, default_value_t = SYNC_QUOTA_BYTES)]
        sync_quota_bytes: usize,

        /// Size limit of the local store in bytes
        #[arg(long, default_value_t = LOCAL_QUOTA_BYTES)]
        local_quota_bytes: usize,
    },

    /// Talk to a running daemon
    Client {
        #[command(subcommand)]
        action: ClientAction,
    },
}

#[derive(Subcommand)]
pub enum ClientAction {
    /// Add an entry
    Add {
        /// Text, URL, or HTML fragment to store
        value: String,

        /// Store as an image entry
        #[arg(long)]
        image: bool,
    },

    /// Delete an entry
    Delete { entry_id: String },

    /// Pin or unpin an entry
    Pin { entry_id: String },

    /// Remove every entry, pinned ones included
    Clear,

    /// List entries, pinned first
    List {
        /// Show at most this many entries
        #[arg(long)]
        limit: Option<u32>,
    },

    /// Print one entry's value
    Get { entry_id: String },

    /// Show the paste menu
    Menu,

    /// Merge both stores into the given one and make it active
    Switch {
        /// sync or local
        mode: StorageMode,
    },

    /// Show current settings
    Settings,

    /// Change the colour theme (blue, red, purple, green, yellow)
    Theme { preset: String },

    /// Print store events until interrupted
    Watch,
}
