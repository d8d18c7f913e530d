//! Capacity bounder.

use super::entry::Entry;

/// Default maximum collection size.
pub const DEFAULT_MAX_ITEMS: usize = 5000;

/// Truncate a canonically ordered collection to at most `max` entries.
///
/// Drops from the tail, so the oldest unpinned entries go first and
/// pinned entries are only cut once the pinned band alone is longer than
/// `max`. Never reorders.
pub fn bound(mut entries: Vec<Entry>, max: usize) -> Vec<Entry> {
    if entries.len() <= max {
        return entries;
    }
    let pinned_dropped = entries[max..].iter().filter(|e| e.is_pinned).count();
    if pinned_dropped > 0 {
        tracing::warn!(
            max,
            pinned_dropped,
            "pinned entries exceed capacity, truncating pinned band"
        );
    }
    tracing::debug!(dropped = entries.len() - max, max, "collection bounded");
    entries.truncate(max);
    entries
}
