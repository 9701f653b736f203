//! Notification normalization
//!
//! Transports disagree on field naming: the kind may arrive as `eventType` or
//! `type` in any casing, and the row images may sit under `new`/`old`,
//! `record`/`old_record`, a nested `payload`, or `after`/`before`. Everything
//! is funneled through [`normalize`] so the synchronizer only ever sees a
//! [`QueueChange`].

use crate::domain::{EntryId, QueueChange, QueueEntry};
use crate::port::{ChangeKind, RawNotification};
use serde_json::Value;

const KIND_FIELDS: &[&str] = &["eventType", "type"];

const NEW_RECORD_PATHS: &[&[&str]] = &[&["new"], &["record"], &["payload", "new"], &["after"]];

const OLD_RECORD_PATHS: &[&[&str]] = &[
    &["old"],
    &["old_record"],
    &["payload", "old"],
    &["before"],
];

/// Map a raw notification to a change, or `None` when there is nothing to apply.
///
/// - INSERT without a usable new row becomes [`QueueChange::Resync`]
/// - UPDATE without a usable new row is dropped
/// - DELETE without an id in any old row is dropped
/// - unknown or missing kinds are dropped
pub fn normalize(raw: &RawNotification) -> Option<QueueChange> {
    match event_kind(raw)? {
        ChangeKind::Insert => Some(
            new_record(raw)
                .map(QueueChange::Insert)
                .unwrap_or(QueueChange::Resync),
        ),
        ChangeKind::Update => new_record(raw).map(QueueChange::Update),
        ChangeKind::Delete => old_id(raw).map(QueueChange::Delete),
    }
}

fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |v, key| v.get(*key))
}

fn event_kind(raw: &Value) -> Option<ChangeKind> {
    KIND_FIELDS
        .iter()
        .filter_map(|field| raw.get(*field).and_then(Value::as_str))
        .find(|s| !s.trim().is_empty())
        .and_then(ChangeKind::parse)
}

fn new_record(raw: &Value) -> Option<QueueEntry> {
    NEW_RECORD_PATHS
        .iter()
        .filter_map(|path| lookup(raw, path))
        .filter(|v| v.is_object())
        .find_map(|v| {
            serde_json::from_value::<QueueEntry>(v.clone())
                .ok()
                .filter(|entry| !entry.id.is_empty())
        })
}

fn old_id(raw: &Value) -> Option<EntryId> {
    OLD_RECORD_PATHS
        .iter()
        .filter_map(|path| lookup(raw, path))
        .filter_map(|old| old.get("id"))
        .find_map(|id| match id {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}
