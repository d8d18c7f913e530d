//! Cross-backend merge.
//!
//! Reconciles the collections of two backends into one. Entries are
//! grouped by identity; when both sides hold the same id the newer copy
//! wins. The result is normalized, reordered, and bounded like any other
//! write.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde_json::Value;

use super::capacity::bound;
use super::entry::Entry;
use super::normalize::{coerce_value, normalize, raw_identity, raw_timestamp};
use super::order::reorder;

/// Merge two raw collections.
///
/// Commutative and idempotent on the surviving set of entries. Raw values
/// whose identity cannot be known yet (bare legacy strings, objects
/// without id or timestamp) pass through ungrouped.
pub fn merge(a: &[Value], b: &[Value], max_items: usize, now: u64) -> Vec<Entry> {
    let mut survivors: Vec<&Value> = Vec::with_capacity(a.len() + b.len());
    let mut slot_of: HashMap<String, usize> = HashMap::new();

    for item in a.iter().chain(b) {
        if !survives_normalize(item) {
            tracing::debug!(?item, "skipping unrecoverable entry in merge");
            continue;
        }
        let Some(id) = raw_identity(item) else {
            survivors.push(item);
            continue;
        };
        match slot_of.get(&id) {
            Some(&slot) => {
                if newer(item, survivors[slot]) == Ordering::Greater {
                    survivors[slot] = item;
                }
            }
            None => {
                slot_of.insert(id, survivors.len());
                survivors.push(item);
            }
        }
    }

    let merged: Vec<Value> = survivors.into_iter().cloned().collect();
    tracing::debug!(
        left = a.len(),
        right = b.len(),
        merged = merged.len(),
        "collections merged"
    );
    bound(reorder(normalize(&merged, now)), max_items)
}

/// Whether `normalize` would keep this raw value. A copy that would be
/// dropped must not displace a readable copy of the same entry.
fn survives_normalize(item: &Value) -> bool {
    match item {
        Value::String(_) => true,
        Value::Object(map) => coerce_value(map.get("value")).is_some(),
        _ => false,
    }
}

/// Compare two copies of the same entry. Larger timestamp wins (missing
/// or non-numeric reads as 0); equal timestamps fall back to the compact
/// JSON text so the choice does not depend on argument order.
fn newer(candidate: &Value, current: &Value) -> Ordering {
    let stamp = |v: &Value| v.get("timestamp").and_then(raw_timestamp).unwrap_or(0);
    stamp(candidate)
        .cmp(&stamp(current))
        .then_with(|| candidate.to_string().cmp(&current.to_string()))
}
