//! Item normalizer: raw stored values to canonical entries.
//!
//! Stored collections carry every shape the history has ever been written
//! in: bare strings, objects without `id`, objects with a `type` tag
//! instead of `kind`, timestamps as strings. `normalize` repairs what it
//! can and drops what it cannot. It never reorders.

use std::collections::HashSet;

use serde_json::{Map, Value};

use super::entry::{Entry, EntryKind, derived_id, fresh_id};

/// Convert raw stored values into well-formed entries.
///
/// Input order is preserved, minus dropped values. `now` stamps entries
/// that have no usable timestamp. Applying this to its own output is a
/// no-op.
pub fn normalize(raw: &[Value], now: u64) -> Vec<Entry> {
    let mut seen: HashSet<String> = HashSet::with_capacity(raw.len());
    let mut out = Vec::with_capacity(raw.len());
    // Legacy strings get distinct, descending stamps so newest-first
    // ordering keeps them in their stored order.
    let mut legacy_strings: u64 = 0;

    for item in raw {
        let entry = match item {
            Value::String(value) => {
                let timestamp = now.saturating_sub(legacy_strings);
                legacy_strings += 1;
                tracing::debug!(timestamp, "upgrading legacy string entry");
                Entry::new(value.clone(), EntryKind::Text, timestamp)
            }
            Value::Object(map) => match entry_from_object(map, now) {
                Some(entry) => entry,
                None => {
                    tracing::debug!(?item, "dropping entry without a value");
                    continue;
                }
            },
            other => {
                tracing::debug!(item = ?other, "dropping malformed entry");
                continue;
            }
        };
        let entry = disambiguate(entry, &seen);
        seen.insert(entry.id.clone());
        out.push(entry);
    }

    out
}

/// Repair one stored object. `None` when it has no `value` at all.
fn entry_from_object(map: &Map<String, Value>, now: u64) -> Option<Entry> {
    let value = coerce_value(map.get("value"))?;
    let timestamp = map.get("timestamp").and_then(raw_timestamp).unwrap_or(now);
    let is_pinned = map.get("isPinned").and_then(Value::as_bool).unwrap_or(false);
    let kind = ["kind", "type"]
        .iter()
        .find_map(|key| map.get(*key).and_then(Value::as_str).and_then(EntryKind::from_tag))
        .unwrap_or_default();
    let id = coerce_id(map.get("id")).unwrap_or_else(|| derived_id(timestamp, &value));

    Some(Entry {
        id,
        value,
        kind,
        is_pinned,
        timestamp,
    })
}

/// Give `entry` a unique id if its id is already taken. The first holder
/// of an id keeps it; later holders get `-1`, `-2`, ...
fn disambiguate(mut entry: Entry, seen: &HashSet<String>) -> Entry {
    if !seen.contains(&entry.id) {
        return entry;
    }
    let base = std::mem::take(&mut entry.id);
    let mut n: u32 = 1;
    loop {
        let candidate = format!("{base}-{n}");
        if !seen.contains(&candidate) {
            tracing::debug!(id = %base, new_id = %candidate, "duplicate id re-keyed");
            entry.id = candidate;
            return entry;
        }
        n += 1;
    }
}

/// Numeric value of a stored timestamp. Accepts integers, non-negative
/// floats (truncated), and numeric strings.
pub(crate) fn raw_timestamp(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map(|f| f as u64)
        }),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite() && *f >= 0.0)
                    .map(|f| f as u64)
            })
        }
        _ => None,
    }
}

/// Text form of a stored `value`. `None` when absent or structured;
/// `null` becomes the empty string.
pub(crate) fn coerce_value(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Null => Some(String::new()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// A usable stored `id`, if there is one.
pub(crate) fn coerce_id(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Identity a raw value would have after normalization, when it can be
/// known without a clock: the stored id, or the id derived from a stored
/// timestamp and value.
pub(crate) fn raw_identity(item: &Value) -> Option<String> {
    let map = item.as_object()?;
    if let Some(id) = coerce_id(map.get("id")) {
        return Some(id);
    }
    let value = coerce_value(map.get("value"))?;
    let timestamp = map.get("timestamp").and_then(raw_timestamp)?;
    Some(derived_id(timestamp, &value))
}

/// Canonical entries back to their stored form.
pub fn to_raw(entries: &[Entry]) -> Vec<Value> {
    entries
        .iter()
        .map(|e| {
            let mut map = Map::with_capacity(5);
            map.insert("id".into(), Value::String(e.id.clone()));
            map.insert("value".into(), Value::String(e.value.clone()));
            map.insert("kind".into(), Value::String(e.kind.as_str().into()));
            map.insert("isPinned".into(), Value::Bool(e.is_pinned));
            map.insert("timestamp".into(), Value::from(e.timestamp));
            Value::Object(map)
        })
        .collect()
}

/// An id not yet used in `entries`, for a new entry created at `timestamp`.
pub(crate) fn unused_id(entries: &[Entry], timestamp: u64) -> String {
    loop {
        let id = fresh_id(timestamp);
        if !entries.iter().any(|e| e.id == id) {
            return id;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NOW: u64 = 1_000_000;

    #[test]
    fn canonical_entries_pass_through() {
        let raw = vec![json!({
            "id": "5_abc", "value": "hi", "kind": "image", "isPinned": true, "timestamp": 5
        })];
        let out = normalize(&raw, NOW);
        assert_eq!(
            out,
            vec![Entry {
                id: "5_abc".into(),
                value: "hi".into(),
                kind: EntryKind::Image,
                is_pinned: true,
                timestamp: 5,
            }]
        );
    }

    #[test]
    fn bare_strings_are_upgraded_in_order() {
        let raw = vec![json!("newest"), json!("older")];
        let out = normalize(&raw, NOW);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].value, "newest");
        assert_eq!(out[0].timestamp, NOW);
        assert_eq!(out[1].timestamp, NOW - 1);
        assert!(out.iter().all(|e| !e.is_pinned && e.kind == EntryKind::Text));
        assert_ne!(out[0].id, out[1].id);
    }

    #[test]
    fn missing_fields_are_backfilled() {
        let raw = vec![json!({ "value": "x" })];
        let out = normalize(&raw, NOW);
        assert_eq!(out[0].timestamp, NOW);
        assert!(!out[0].is_pinned);
        assert_eq!(out[0].kind, EntryKind::Text);
        assert_eq!(out[0].id, derived_id(NOW, "x"));
    }

    #[test]
    fn non_bool_pin_reads_as_unpinned() {
        let raw = vec![json!({ "value": "x", "timestamp": 1, "isPinned": "yes" })];
        assert!(!normalize(&raw, NOW)[0].is_pinned);
    }

    #[test]
    fn legacy_type_tag_sets_kind() {
        let raw = vec![json!({ "value": "<img src=a>", "timestamp": 1, "type": "image" })];
        assert_eq!(normalize(&raw, NOW)[0].kind, EntryKind::Image);
    }

    #[test]
    fn kind_is_not_inferred_from_value() {
        let raw = vec![json!({ "value": "<img src=a>", "timestamp": 1 })];
        assert_eq!(normalize(&raw, NOW)[0].kind, EntryKind::Text);
    }

    #[test]
    fn unrecoverable_values_are_dropped() {
        let raw = vec![
            json!(null),
            json!(42),
            json!(true),
            json!([1, 2]),
            json!({ "timestamp": 1 }),
            json!({ "value": { "nested": true } }),
            json!("kept"),
        ];
        let out = normalize(&raw, NOW);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].value, "kept");
    }

    #[test]
    fn null_value_becomes_empty_string() {
        let raw = vec![json!({ "value": null, "timestamp": 3 })];
        let out = normalize(&raw, NOW);
        assert_eq!(out[0].value, "");
    }

    #[test]
    fn timestamp_shapes() {
        assert_eq!(raw_timestamp(&json!(12)), Some(12));
        assert_eq!(raw_timestamp(&json!(12.9)), Some(12));
        assert_eq!(raw_timestamp(&json!("34")), Some(34));
        assert_eq!(raw_timestamp(&json!(" 5.5 ")), Some(5));
        assert_eq!(raw_timestamp(&json!(-1)), None);
        assert_eq!(raw_timestamp(&json!("soon")), None);
        assert_eq!(raw_timestamp(&json!(null)), None);
    }

    #[test]
    fn duplicate_ids_are_rekeyed_after_the_first() {
        let raw = vec![
            json!({ "id": "a", "value": "1", "timestamp": 1 }),
            json!({ "id": "a", "value": "2", "timestamp": 2 }),
            json!({ "id": "a-1", "value": "3", "timestamp": 3 }),
        ];
        let ids: Vec<String> = normalize(&raw, NOW).into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["a", "a-1", "a-1-1"]);
    }

    #[test]
    fn derived_ids_are_deterministic_across_reads() {
        let raw = vec![json!({ "value": "v", "timestamp": 77 })];
        assert_eq!(normalize(&raw, NOW)[0].id, normalize(&raw, NOW + 5)[0].id);
    }

    #[test]
    fn normalize_is_idempotent() {
        let raw = vec![
            json!("legacy"),
            json!({ "value": "partial" }),
            json!({ "value": 9, "timestamp": "10", "type": "image_url" }),
            json!({ "id": "d", "value": "dup", "timestamp": 4, "isPinned": true }),
            json!({ "id": "d", "value": "dup2", "timestamp": 4 }),
            json!(null),
        ];
        let once = normalize(&raw, NOW);
        let twice = normalize(&to_raw(&once), NOW + 1000);
        assert_eq!(once, twice);
    }

    #[test]
    fn raw_identity_matches_normalized_id() {
        let stored = json!({ "value": "v", "timestamp": 8 });
        assert_eq!(
            raw_identity(&stored),
            Some(normalize(&[stored.clone()], NOW)[0].id.clone())
        );
        assert_eq!(raw_identity(&json!({ "id": 17, "value": "v" })), Some("17".into()));
        assert_eq!(raw_identity(&json!({ "value": "no stamp" })), None);
        assert_eq!(raw_identity(&json!("bare")), None);
    }

    #[test]
    fn unused_id_avoids_existing() {
        let entries = normalize(&[json!({ "id": "1_x", "value": "a", "timestamp": 1 })], NOW);
        assert_ne!(unused_id(&entries, 1), "1_x");
    }
}
