// Published Queue State

use crate::domain::{EntryStatus, QueueEntry};
use std::sync::Arc;

/// Immutable snapshot of the synchronizer state.
///
/// Every transition publishes a new snapshot; readers holding an old one keep
/// a consistent view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueState {
    pub entries: Arc<Vec<QueueEntry>>,
    pub loading: bool,
    pub last_error: Option<String>,
}

impl QueueState {
    /// State before the initial load completes
    pub fn loading() -> Self {
        Self {
            entries: Arc::new(Vec::new()),
            loading: true,
            last_error: None,
        }
    }

    pub fn get(&self, id: &str) -> Option<&QueueEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.id.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries still waiting for help, oldest first
    pub fn waiting(&self) -> impl Iterator<Item = &QueueEntry> {
        self.with_status(EntryStatus::Waiting)
    }

    /// Entries already seen, oldest first
    pub fn seen(&self) -> impl Iterator<Item = &QueueEntry> {
        self.with_status(EntryStatus::Seen)
    }

    pub fn waiting_count(&self) -> usize {
        self.waiting().count()
    }

    pub fn seen_count(&self) -> usize {
        self.seen().count()
    }

    fn with_status(&self, status: EntryStatus) -> impl Iterator<Item = &QueueEntry> {
        self.entries.iter().filter(move |e| e.status == status)
    }
}
