// Queue Store Port (Interface)
// The backing data service is the source of truth; this is its client-side face.

use crate::domain::{EntryStatus, QueueEntry};
use crate::error::Result;
use async_trait::async_trait;

/// Backing store for queue entries
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Fetch the whole collection, ordered by `created_at` ascending
    async fn fetch_all(&self) -> Result<Vec<QueueEntry>>;

    /// Insert a new waiting entry
    ///
    /// # Errors
    /// - AppError::Domain if the student name is blank
    async fn insert(&self, student_name: &str, topic_area: Option<&str>) -> Result<QueueEntry>;

    /// Set the status of an entry
    ///
    /// # Errors
    /// - AppError::NotFound if no entry has this id
    async fn update_status(&self, id: &str, status: EntryStatus) -> Result<()>;

    /// Delete an entry (deleting an unknown id is not an error)
    async fn delete(&self, id: &str) -> Result<()>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::NewEntry;
    use crate::error::AppError;
    use chrono::{DateTime, TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::sync::Semaphore;

    /// Holds calls until permits are released (None = pass through)
    #[derive(Default)]
    struct Gate(Mutex<Option<Arc<Semaphore>>>);

    impl Gate {
        fn close(&self) {
            *self.0.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
        }

        fn open(&self, permits: usize) {
            if let Some(sem) = self.0.lock().unwrap().as_ref() {
                sem.add_permits(permits);
            }
        }

        async fn pass(&self) {
            let sem = self.0.lock().unwrap().clone();
            if let Some(sem) = sem {
                if let Ok(permit) = sem.acquire().await {
                    permit.forget();
                }
            }
        }
    }

    /// In-memory QueueStore for testing
    #[derive(Default)]
    pub struct FakeQueueStore {
        entries: Mutex<Vec<QueueEntry>>,
        fetch_error: Mutex<Option<String>>,
        mutation_error: Mutex<Option<String>>,
        fetch_gate: Gate,
        mutation_gate: Gate,
        fetch_count: AtomicUsize,
        next_id: AtomicUsize,
        status_updates: Mutex<Vec<(String, EntryStatus)>>,
        deletes: Mutex<Vec<String>>,
    }

    impl FakeQueueStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_entries(entries: Vec<QueueEntry>) -> Self {
            let store = Self::new();
            store.set_entries(entries);
            store
        }

        /// Replace the server-side collection (kept sorted like a real query)
        pub fn set_entries(&self, mut entries: Vec<QueueEntry>) {
            entries.sort_by_key(|e| e.created_at);
            *self.entries.lock().unwrap() = entries;
        }

        pub fn entries(&self) -> Vec<QueueEntry> {
            self.entries.lock().unwrap().clone()
        }

        pub fn fail_fetches(&self, message: impl Into<String>) {
            *self.fetch_error.lock().unwrap() = Some(message.into());
        }

        pub fn fail_mutations(&self, message: impl Into<String>) {
            *self.mutation_error.lock().unwrap() = Some(message.into());
        }

        pub fn heal(&self) {
            *self.fetch_error.lock().unwrap() = None;
            *self.mutation_error.lock().unwrap() = None;
        }

        /// Block every subsequent fetch until `release_fetches` is called
        pub fn hold_fetches(&self) {
            self.fetch_gate.close();
        }

        pub fn release_fetches(&self, n: usize) {
            self.fetch_gate.open(n);
        }

        /// Block every subsequent update/delete until `release_mutations` is called
        pub fn hold_mutations(&self) {
            self.mutation_gate.close();
        }

        pub fn release_mutations(&self, n: usize) {
            self.mutation_gate.open(n);
        }

        pub fn fetch_count(&self) -> usize {
            self.fetch_count.load(Ordering::SeqCst)
        }

        pub fn status_updates(&self) -> Vec<(String, EntryStatus)> {
            self.status_updates.lock().unwrap().clone()
        }

        pub fn deletes(&self) -> Vec<String> {
            self.deletes.lock().unwrap().clone()
        }

        fn mutation_error(&self) -> Option<AppError> {
            self.mutation_error
                .lock()
                .unwrap()
                .clone()
                .map(AppError::Store)
        }

        fn next_timestamp(n: usize) -> DateTime<Utc> {
            Utc.timestamp_opt(1_700_000_000 + n as i64 * 60, 0).unwrap()
        }
    }

    #[async_trait]
    impl QueueStore for FakeQueueStore {
        async fn fetch_all(&self) -> Result<Vec<QueueEntry>> {
            self.fetch_count.fetch_add(1, Ordering::SeqCst);
            self.fetch_gate.pass().await;

            if let Some(message) = self.fetch_error.lock().unwrap().clone() {
                return Err(AppError::Store(message));
            }
            Ok(self.entries())
        }

        async fn insert(&self, student_name: &str, topic_area: Option<&str>) -> Result<QueueEntry> {
            let new_entry = NewEntry::parse(student_name, topic_area)?;
            if let Some(err) = self.mutation_error() {
                return Err(err);
            }

            let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            let entry = new_entry.into_entry(format!("entry-{}", n), Self::next_timestamp(n));
            self.entries.lock().unwrap().push(entry.clone());
            Ok(entry)
        }

        async fn update_status(&self, id: &str, status: EntryStatus) -> Result<()> {
            self.status_updates
                .lock()
                .unwrap()
                .push((id.to_string(), status));
            self.mutation_gate.pass().await;

            if let Some(err) = self.mutation_error() {
                return Err(err);
            }

            let mut entries = self.entries.lock().unwrap();
            match entries.iter_mut().find(|e| e.id == id) {
                Some(entry) => {
                    entry.status = status;
                    Ok(())
                }
                None => Err(AppError::NotFound(format!("queue entry {}", id))),
            }
        }

        async fn delete(&self, id: &str) -> Result<()> {
            self.deletes.lock().unwrap().push(id.to_string());
            self.mutation_gate.pass().await;

            if let Some(err) = self.mutation_error() {
                return Err(err);
            }

            self.entries.lock().unwrap().retain(|e| e.id != id);
            Ok(())
        }
    }
}
