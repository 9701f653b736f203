// Pure collection transforms
// Every function returns a fresh Vec; the input slice is never touched.

use crate::domain::{QueueChange, QueueEntry};

/// Apply a normalized change. `Resync` is not a patch and leaves the input as is.
pub fn apply_change(entries: &[QueueEntry], change: QueueChange) -> Vec<QueueEntry> {
    match change {
        QueueChange::Insert(entry) => upsert(entries, entry),
        QueueChange::Update(entry) => replace(entries, entry),
        QueueChange::Delete(id) => remove(entries, &id),
        QueueChange::Resync => entries.to_vec(),
    }
}

/// Overwrite by id when present, append otherwise
pub fn upsert(entries: &[QueueEntry], incoming: QueueEntry) -> Vec<QueueEntry> {
    if entries.iter().any(|e| e.id == incoming.id) {
        return replace(entries, incoming);
    }

    let mut next = Vec::with_capacity(entries.len() + 1);
    next.extend_from_slice(entries);
    next.push(incoming);
    sorted(next)
}

/// Overwrite by id; unknown ids change nothing
pub fn replace(entries: &[QueueEntry], incoming: QueueEntry) -> Vec<QueueEntry> {
    let next = entries
        .iter()
        .map(|e| {
            if e.id == incoming.id {
                e.absorb(incoming.clone())
            } else {
                e.clone()
            }
        })
        .collect();
    sorted(next)
}

pub fn remove(entries: &[QueueEntry], id: &str) -> Vec<QueueEntry> {
    entries.iter().filter(|e| e.id != id).cloned().collect()
}

pub fn mark_seen(entries: &[QueueEntry], id: &str) -> Vec<QueueEntry> {
    entries
        .iter()
        .cloned()
        .map(|mut e| {
            if e.id == id {
                e.mark_seen();
            }
            e
        })
        .collect()
}

/// Stable sort by `created_at` ascending
pub fn sorted(mut entries: Vec<QueueEntry>) -> Vec<QueueEntry> {
    entries.sort_by_key(|e| e.created_at);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EntryStatus;
    use chrono::{DateTime, TimeZone, Utc};

    fn t(n: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + n * 60, 0).unwrap()
    }

    fn entry(id: &str, at: i64) -> QueueEntry {
        QueueEntry::new(id, t(at), format!("student {}", id), None)
    }

    fn ids(entries: &[QueueEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.id.as_str()).collect()
    }

    fn is_sorted(entries: &[QueueEntry]) -> bool {
        entries.windows(2).all(|w| w[0].created_at <= w[1].created_at)
    }

    #[test]
    fn test_insert_then_duplicate_insert_is_idempotent() {
        let first = entry("a", 1);
        let entries = apply_change(&[], QueueChange::Insert(first.clone()));
        assert_eq!(ids(&entries), vec!["a"]);

        let mut seen = first;
        seen.status = EntryStatus::Seen;
        let entries = apply_change(&entries, QueueChange::Insert(seen));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, EntryStatus::Seen);
    }

    #[test]
    fn test_out_of_order_inserts_stay_sorted() {
        let mut entries = Vec::new();
        for (id, at) in [("c", 3), ("a", 1), ("d", 4), ("b", 2), ("a", 1)] {
            entries = apply_change(&entries, QueueChange::Insert(entry(id, at)));
            assert!(is_sorted(&entries));
        }
        assert_eq!(ids(&entries), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_update_reorders_when_timestamp_changes() {
        let entries = vec![entry("a", 1), entry("b", 2)];
        let moved = entry("a", 5);
        let entries = apply_change(&entries, QueueChange::Update(moved));
        assert_eq!(ids(&entries), vec!["b", "a"]);
    }

    #[test]
    fn test_update_for_unknown_id_changes_nothing() {
        let entries = vec![entry("a", 1)];
        let next = apply_change(&entries, QueueChange::Update(entry("zz", 0)));
        assert_eq!(next, entries);
    }

    #[test]
    fn test_delete_present_and_absent() {
        let entries = vec![entry("a", 1), entry("b", 2)];
        let next = apply_change(&entries, QueueChange::Delete("a".to_string()));
        assert_eq!(ids(&next), vec!["b"]);

        let again = apply_change(&next, QueueChange::Delete("a".to_string()));
        assert_eq!(again, next);
    }

    #[test]
    fn test_stale_waiting_row_does_not_revert_seen() {
        let entries = mark_seen(&[entry("a", 1)], "a");
        let next = apply_change(&entries, QueueChange::Update(entry("a", 1)));
        assert_eq!(next[0].status, EntryStatus::Seen);
    }

    #[test]
    fn test_input_is_left_untouched() {
        let entries = vec![entry("a", 1), entry("b", 2)];
        let before = entries.clone();
        let _ = mark_seen(&entries, "a");
        let _ = remove(&entries, "b");
        assert_eq!(entries, before);
    }
}
