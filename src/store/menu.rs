//! Paste-menu composition.
//!
//! Builds the short list shown in the "paste from history" context menu:
//! every pinned entry, then the most recent unpinned ones. Values already
//! shown and blank values are skipped here only; storage keeps them.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::entry::Entry;

/// Unpinned entries shown in the paste menu.
pub const MENU_UNPINNED_LIMIT: usize = 5;

/// Titles longer than this are shortened.
const TITLE_MAX_CHARS: usize = 30;
/// Characters kept from a shortened title, before the ellipsis.
const TITLE_KEEP_CHARS: usize = 27;
const PIN_PREFIX: &str = "📌 ";

/// One paste-menu row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    pub entry_id: String,
    pub title: String,
    pub pinned: bool,
}

/// Compose the paste menu from a canonically ordered collection.
pub fn paste_menu(entries: &[Entry], max_unpinned: usize) -> Vec<MenuItem> {
    let mut shown: HashSet<&str> = HashSet::new();
    let mut items = Vec::new();

    let displayable = |e: &&Entry| !e.value.trim().is_empty();

    for entry in entries.iter().filter(|e| e.is_pinned).filter(displayable) {
        if shown.insert(entry.value.as_str()) {
            items.push(menu_item(entry));
        }
    }

    let mut unpinned_shown = 0;
    for entry in entries.iter().filter(|e| !e.is_pinned).filter(displayable) {
        if unpinned_shown == max_unpinned {
            break;
        }
        if shown.insert(entry.value.as_str()) {
            items.push(menu_item(entry));
            unpinned_shown += 1;
        }
    }

    items
}

fn menu_item(entry: &Entry) -> MenuItem {
    let prefix = if entry.is_pinned { PIN_PREFIX } else { "" };
    MenuItem {
        entry_id: entry.id.clone(),
        title: format!("{prefix}{}", shorten(&entry.value)),
        pinned: entry.is_pinned,
    }
}

fn shorten(value: &str) -> String {
    if value.chars().count() <= TITLE_MAX_CHARS {
        return value.to_string();
    }
    let kept: String = value.chars().take(TITLE_KEEP_CHARS).collect();
    format!("{kept}...")
}
