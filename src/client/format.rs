//! Output formatting for CLI client commands.
//!
//! Human-readable tables and status lines. `get` prints the raw value to
//! stdout and metadata to stderr so that piping works naturally
//! (`clipstash client get <id> | xclip`).

use std::io::{self, Write};

use crate::ipc::protocol::SettingsDescriptor;
use crate::notify::StoreEvent;
use crate::settings::StorageMode;
use crate::store::Entry;
use crate::store::menu::MenuItem;

/// Width of the value column in entry tables.
const PREVIEW_CHARS: usize = 48;

/// Print entries as a table to stdout.
pub fn print_entries(entries: &[Entry]) {
    if entries.is_empty() {
        println!("No entries");
        return;
    }

    println!("{:<24} {:<5} {:<6} {:>14} VALUE", "ID", "PIN", "KIND", "TIMESTAMP");
    println!("{}", "-".repeat(24 + 5 + 6 + 14 + 4 + PREVIEW_CHARS));
    for e in entries {
        println!(
            "{:<24} {:<5} {:<6} {:>14} {}",
            e.id,
            if e.is_pinned { "yes" } else { "-" },
            e.kind.as_str(),
            e.timestamp,
            preview(&e.value, PREVIEW_CHARS),
        );
    }
}

/// Print one entry: metadata to stderr, raw value to stdout.
pub fn print_entry(entry: &Entry) -> Result<(), io::Error> {
    eprintln!("Id:        {}", entry.id);
    eprintln!("Kind:      {}", entry.kind.as_str());
    eprintln!("Pinned:    {}", if entry.is_pinned { "yes" } else { "no" });
    eprintln!("Timestamp: {}", entry.timestamp);
    eprintln!("---");
    let mut stdout = io::stdout().lock();
    stdout.write_all(entry.value.as_bytes())?;
    if !entry.value.ends_with('\n') {
        stdout.write_all(b"\n")?;
    }
    Ok(())
}

pub fn print_inserted(entry: &Entry) {
    println!("Added {}", entry.id);
}

pub fn print_deleted(entry_id: &str, removed: bool) {
    if removed {
        println!("Deleted {entry_id}");
    } else {
        println!("No entry {entry_id}, nothing deleted");
    }
}

pub fn print_pin(entry: &Entry) {
    let state = if entry.is_pinned { "Pinned" } else { "Unpinned" };
    println!("{state} {}", entry.id);
}

pub fn print_cleared() {
    println!("History cleared");
}

/// Print paste-menu rows.
pub fn print_menu(menu: &[MenuItem]) {
    if menu.is_empty() {
        println!("Paste menu is empty");
        return;
    }
    for item in menu {
        println!("{:<24} {}", item.entry_id, item.title);
    }
}

pub fn print_switched(mode: StorageMode, entries: &[Entry]) {
    println!("Storage mode is now {mode} ({} entries)", entries.len());
}

pub fn print_settings(settings: &SettingsDescriptor) {
    println!("Storage mode:       {}", settings.storage_mode);
    println!("Image storage mode: {}", settings.image_storage_mode.as_str());
    println!("Max items:          {}", settings.max_items);
    println!("Icon:               {}", settings.icon);
    println!("Theme:              {}", settings.theme.join(" "));
}

/// Print one store event as a single line.
pub fn print_event(event: &StoreEvent) {
    match event {
        StoreEvent::ItemsChanged => println!("items changed"),
        StoreEvent::StorageModeChanged { mode } => println!("storage mode changed: {mode}"),
        StoreEvent::ThemeChanged => println!("theme changed"),
    }
}

/// Single-line preview of a value: control characters escaped, cut to
/// `max` characters with a trailing `...`.
fn preview(value: &str, max: usize) -> String {
    let mut flat = String::with_capacity(value.len());
    for c in value.chars() {
        if c.is_control() {
            flat.extend(c.escape_default());
        } else {
            flat.push(c);
        }
    }
    if flat.chars().count() <= max {
        return flat;
    }
    let kept: String = flat.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}
