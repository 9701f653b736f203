// Queue Entry Domain Model

use crate::domain::error::{DomainError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Entry ID (opaque, assigned by the backing store)
pub type EntryId = String;

/// Backing collection the queue lives in
pub const QUEUE_COLLECTION: &str = "queue_requests";

/// Entry Status
///
/// Ordered: `Waiting < Seen`. Status only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Waiting,
    Seen,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Waiting => "waiting",
            EntryStatus::Seen => "seen",
        }
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "waiting" => Ok(EntryStatus::Waiting),
            "seen" => Ok(EntryStatus::Seen),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}

/// One student's help request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: EntryId,
    pub created_at: DateTime<Utc>,
    pub student_name: String,
    #[serde(default)]
    pub topic_area: Option<String>,
    pub status: EntryStatus,
}

impl QueueEntry {
    /// Create a waiting entry
    ///
    /// # Arguments
    ///
    /// * `id` - Entry ID (injected, not generated)
    /// * `created_at` - Creation timestamp (injected, not system time)
    /// * `student_name` - Requesting student
    /// * `topic_area` - Optional topic description
    pub fn new(
        id: impl Into<String>,
        created_at: DateTime<Utc>,
        student_name: impl Into<String>,
        topic_area: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            created_at,
            student_name: student_name.into(),
            topic_area,
            status: EntryStatus::Waiting,
        }
    }

    pub fn is_waiting(&self) -> bool {
        self.status == EntryStatus::Waiting
    }

    /// Move to `status`, rejecting any backwards transition
    pub fn transition_to(&mut self, status: EntryStatus) -> Result<()> {
        if status < self.status {
            return Err(DomainError::InvalidStatusTransition {
                from: self.status.to_string(),
                to: status.to_string(),
            });
        }
        self.status = status;
        Ok(())
    }

    /// Transition Waiting -> Seen (marking an already seen entry is a no-op)
    pub fn mark_seen(&mut self) {
        self.status = EntryStatus::Seen;
    }

    /// Take every field from `incoming`, keeping the furthest status of the two.
    ///
    /// A duplicated or reordered record can still say `waiting` after the entry
    /// was marked seen locally.
    pub fn absorb(&self, incoming: QueueEntry) -> QueueEntry {
        let status = self.status.max(incoming.status);
        QueueEntry { status, ..incoming }
    }

    /// Whole minutes (rounded) since the request was created
    pub fn minutes_waiting(&self, now: DateTime<Utc>) -> i64 {
        let elapsed_ms = (now - self.created_at).num_milliseconds();
        (elapsed_ms as f64 / 60_000.0).round() as i64
    }
}

/// Validated submission, ready to be persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    student_name: String,
    topic_area: Option<String>,
}

impl NewEntry {
    /// Validate raw form input.
    ///
    /// The name is trimmed and required; a topic that trims to nothing becomes `None`.
    pub fn parse(student_name: &str, topic_area: Option<&str>) -> Result<Self> {
        let student_name = student_name.trim();
        if student_name.is_empty() {
            return Err(DomainError::ValidationError(
                "Student name is required.".to_string(),
            ));
        }

        let topic_area = topic_area
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        Ok(Self {
            student_name: student_name.to_string(),
            topic_area,
        })
    }

    pub fn student_name(&self) -> &str {
        &self.student_name
    }

    pub fn topic_area(&self) -> Option<&str> {
        self.topic_area.as_deref()
    }

    /// Materialize with store-assigned identity
    pub fn into_entry(self, id: impl Into<String>, created_at: DateTime<Utc>) -> QueueEntry {
        QueueEntry::new(id, created_at, self.student_name, self.topic_area)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_status_only_moves_forward() {
        let mut entry = QueueEntry::new("a", at(0), "Alice", None);
        assert!(entry.transition_to(EntryStatus::Seen).is_ok());

        let err = entry.transition_to(EntryStatus::Waiting).unwrap_err();
        assert_eq!(
            err,
            DomainError::InvalidStatusTransition {
                from: "seen".to_string(),
                to: "waiting".to_string(),
            }
        );
        assert_eq!(entry.status, EntryStatus::Seen);
    }

    #[test]
    fn test_absorb_keeps_seen_status() {
        let mut local = QueueEntry::new("a", at(0), "Alice", None);
        local.mark_seen();

        let incoming = QueueEntry::new("a", at(0), "Alice B.", Some("graphs".to_string()));
        let merged = local.absorb(incoming);

        assert_eq!(merged.status, EntryStatus::Seen);
        assert_eq!(merged.student_name, "Alice B.");
        assert_eq!(merged.topic_area.as_deref(), Some("graphs"));
    }

    #[test]
    fn test_minutes_waiting_rounds() {
        let entry = QueueEntry::new("a", at(0), "Alice", None);
        assert_eq!(entry.minutes_waiting(at(0)), 0);
        assert_eq!(entry.minutes_waiting(at(0) + Duration::seconds(89)), 1);
        assert_eq!(entry.minutes_waiting(at(0) + Duration::seconds(90)), 2);
    }

    #[test]
    fn test_new_entry_trims_and_normalizes_topic() {
        let entry = NewEntry::parse("  Bob  ", Some("   ")).unwrap();
        assert_eq!(entry.student_name(), "Bob");
        assert_eq!(entry.topic_area(), None);

        let entry = NewEntry::parse("Bob", Some(" recursion ")).unwrap();
        assert_eq!(entry.topic_area(), Some("recursion"));
    }

    #[test]
    fn test_new_entry_requires_name() {
        let result = NewEntry::parse("   ", Some("loops"));
        assert!(result.unwrap_err().to_string().contains("required"));
    }

    #[test]
    fn test_wire_shape() {
        let json = serde_json::json!({
            "id": "a",
            "created_at": "2024-03-01T09:30:00.123456+00:00",
            "student_name": "Alice",
            "status": "seen"
        });
        let entry: QueueEntry = serde_json::from_value(json).unwrap();
        assert_eq!(entry.status, EntryStatus::Seen);
        assert_eq!(entry.topic_area, None);
        assert_eq!("waiting".parse::<EntryStatus>().unwrap(), EntryStatus::Waiting);
        assert!("done".parse::<EntryStatus>().is_err());
    }
}
