//! clipstash: clipboard history with pinning, bounded capacity, and
//! reconciliation between a small synced store and a large local one.
//!
//! The [`store`] module holds the engine; [`daemon`] and [`client`] wrap it
//! in a Unix-socket service and a CLI.

pub mod backend;
pub mod cli;
pub mod client;
pub mod clock;
pub mod daemon;
pub mod ipc;
pub mod notify;
pub mod settings;
pub mod store;
