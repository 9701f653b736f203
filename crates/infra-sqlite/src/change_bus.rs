// Change Bus - fans store notifications out to feed subscribers

use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tutorq_core::domain::{QueueEntry, QUEUE_COLLECTION};
use tutorq_core::port::{ChangeKind, RawNotification};

/// Broadcast bus shared by `SqliteQueueStore` (producer) and
/// `SqliteChangeFeed` (consumer side).
#[derive(Clone)]
pub struct ChangeBus {
    sender: broadcast::Sender<RawNotification>,
}

impl ChangeBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RawNotification> {
        self.sender.subscribe()
    }

    /// Publish a row change in realtime shape
    pub fn publish(&self, kind: ChangeKind, new: Option<&QueueEntry>, old_id: Option<&str>) {
        let new = new
            .and_then(|entry| serde_json::to_value(entry).ok())
            .unwrap_or_else(|| json!({}));
        let old = old_id.map(|id| json!({ "id": id })).unwrap_or_else(|| json!({}));

        let notification: Value = json!({
            "eventType": kind.as_str(),
            "schema": "public",
            "table": QUEUE_COLLECTION,
            "commit_timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            "new": new,
            "old": old,
            "errors": null,
        });

        // No subscribers is fine; lagging ones catch up through reconciliation
        let _ = self.sender.send(notification);
    }
}
