// Queue Change - normalized form of a backing store notification

use crate::domain::entry::{EntryId, QueueEntry};

/// A single change to apply to the local queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueChange {
    /// Upsert by id
    Insert(QueueEntry),
    /// Replace the entry with the same id
    Update(QueueEntry),
    /// Remove by id
    Delete(EntryId),
    /// Local state is known to be stale, reload everything
    Resync,
}

impl QueueChange {
    pub fn kind(&self) -> &'static str {
        match self {
            QueueChange::Insert(_) => "INSERT",
            QueueChange::Update(_) => "UPDATE",
            QueueChange::Delete(_) => "DELETE",
            QueueChange::Resync => "RESYNC",
        }
    }
}
