//! Ordering engine: canonical order of a collection.
//!
//! Pinned entries first, in their existing relative order; then unpinned
//! entries newest-first, ties broken by id.

use std::cmp::Ordering;

use super::entry::Entry;

/// Put `entries` into canonical order.
pub fn reorder(entries: Vec<Entry>) -> Vec<Entry> {
    let (mut ordered, mut unpinned): (Vec<Entry>, Vec<Entry>) =
        entries.into_iter().partition(|e| e.is_pinned);
    unpinned.sort_by(recency);
    ordered.append(&mut unpinned);
    ordered
}

/// Newest first; equal timestamps ordered by id.
fn recency(a: &Entry, b: &Entry) -> Ordering {
    b.timestamp
        .cmp(&a.timestamp)
        .then_with(|| a.id.cmp(&b.id))
}

/// Whether `entries` is already in canonical order.
#[cfg(test)]
pub(crate) fn is_canonical(entries: &[Entry]) -> bool {
    let pinned = entries.iter().take_while(|e| e.is_pinned).count();
    let rest = &entries[pinned..];
    rest.iter().all(|e| !e.is_pinned)
        && rest
            .windows(2)
            .all(|w| recency(&w[0], &w[1]) != Ordering::Greater)
}
