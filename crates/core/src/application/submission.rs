// Submission Use Case - a student joins the queue

use crate::domain::{NewEntry, QueueEntry};
use crate::error::Result;
use crate::port::QueueStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Raw form input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub student_name: String,

    #[serde(default)]
    pub topic_area: Option<String>,
}

/// Submission Service
pub struct SubmissionService {
    store: Arc<dyn QueueStore>,
}

impl SubmissionService {
    pub fn new(store: Arc<dyn QueueStore>) -> Self {
        Self { store }
    }

    /// Validate and insert a help request.
    ///
    /// Blank names are rejected before the store is contacted.
    pub async fn submit(&self, req: SubmitRequest) -> Result<QueueEntry> {
        let new_entry = NewEntry::parse(&req.student_name, req.topic_area.as_deref())?;

        let entry = self
            .store
            .insert(new_entry.student_name(), new_entry.topic_area())
            .await
            .inspect_err(|e| warn!(error = %e, "Queue submission rejected by store"))?;

        info!(
            entry_id = %entry.id,
            has_topic = entry.topic_area.is_some(),
            "Student joined the queue"
        );
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EntryStatus;
    use crate::error::AppError;
    use crate::port::queue_store::mocks::FakeQueueStore;

    fn request(name: &str, topic: Option<&str>) -> SubmitRequest {
        SubmitRequest {
            student_name: name.to_string(),
            topic_area: topic.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_submit_normalizes_input() {
        let store = Arc::new(FakeQueueStore::new());
        let service = SubmissionService::new(store.clone());

        let entry = service.submit(request("  Dana ", Some(""))).await.unwrap();
        assert_eq!(entry.student_name, "Dana");
        assert_eq!(entry.topic_area, None);
        assert_eq!(entry.status, EntryStatus::Waiting);
        assert_eq!(store.entries(), vec![entry]);
    }

    #[tokio::test]
    async fn test_blank_name_never_reaches_store() {
        let store = Arc::new(FakeQueueStore::new());
        let service = SubmissionService::new(store.clone());

        let err = service.submit(request(" \t", Some("sorting"))).await.unwrap_err();
        assert!(matches!(err, AppError::Domain(_)));
        assert!(store.entries().is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_is_returned() {
        let store = Arc::new(FakeQueueStore::new());
        store.fail_mutations("queue is closed");
        let service = SubmissionService::new(store);

        let err = service.submit(request("Eve", None)).await.unwrap_err();
        assert!(err.to_string().contains("queue is closed"));
    }
}
