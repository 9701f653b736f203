// Change Feed Port (Interface)
// Push stream of change notifications for a backing collection.
// Delivery is best-effort: notifications may be dropped, duplicated or reordered.

use crate::error::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Notification exactly as the transport delivered it.
///
/// Field naming differs between transports and versions; see
/// `application::sync::notification::normalize`.
pub type RawNotification = serde_json::Value;

/// Kind of change carried by a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    pub const ALL: [ChangeKind; 3] = [ChangeKind::Insert, ChangeKind::Update, ChangeKind::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Insert => "INSERT",
            ChangeKind::Update => "UPDATE",
            ChangeKind::Delete => "DELETE",
        }
    }

    /// Case-insensitive parse (`insert`, `Insert`, `INSERT`)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INSERT" => Some(ChangeKind::Insert),
            "UPDATE" => Some(ChangeKind::Update),
            "DELETE" => Some(ChangeKind::Delete),
            _ => None,
        }
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registration handle returned by `subscribe`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    pub id: u64,
    pub collection: String,
}

/// An open subscription
pub struct Subscription {
    pub handle: SubscriptionHandle,
    pub events: mpsc::Receiver<RawNotification>,
}

/// Change feed port
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Open a subscription to `collection` for the given change kinds
    ///
    /// # Errors
    /// - AppError::Subscription if the collection is unknown or the feed is closed
    async fn subscribe(&self, collection: &str, kinds: &[ChangeKind]) -> Result<Subscription>;

    /// Stop delivering notifications to this handle
    async fn unsubscribe(&self, handle: &SubscriptionHandle) -> Result<()>;

    /// Drop the registration entirely
    async fn release(&self, handle: SubscriptionHandle) -> Result<()>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    /// Scripted ChangeFeed for testing
    #[derive(Default)]
    pub struct FakeChangeFeed {
        subscribers: Mutex<Vec<(SubscriptionHandle, mpsc::Sender<RawNotification>)>>,
        next_id: AtomicU64,
        requested_kinds: Mutex<Vec<ChangeKind>>,
        subscribe_calls: AtomicU64,
        unsubscribe_calls: AtomicU64,
        release_calls: AtomicU64,
        fail_subscribe: Mutex<bool>,
        fail_unsubscribe: Mutex<bool>,
        fail_release: Mutex<bool>,
    }

    impl FakeChangeFeed {
        pub fn new() -> Self {
            Self::default()
        }

        /// Deliver to every live subscriber; returns how many received it
        pub async fn publish(&self, notification: RawNotification) -> usize {
            let senders: Vec<_> = self
                .subscribers
                .lock()
                .unwrap()
                .iter()
                .map(|(_, tx)| tx.clone())
                .collect();

            let mut delivered = 0;
            for tx in senders {
                if tx.send(notification.clone()).await.is_ok() {
                    delivered += 1;
                }
            }
            delivered
        }

        pub fn active_subscriptions(&self) -> usize {
            self.subscribers.lock().unwrap().len()
        }

        pub fn requested_kinds(&self) -> Vec<ChangeKind> {
            self.requested_kinds.lock().unwrap().clone()
        }

        pub fn subscribe_calls(&self) -> u64 {
            self.subscribe_calls.load(Ordering::SeqCst)
        }

        pub fn unsubscribe_calls(&self) -> u64 {
            self.unsubscribe_calls.load(Ordering::SeqCst)
        }

        pub fn release_calls(&self) -> u64 {
            self.release_calls.load(Ordering::SeqCst)
        }

        pub fn fail_subscribe(&self) {
            *self.fail_subscribe.lock().unwrap() = true;
        }

        pub fn fail_unsubscribe(&self) {
            *self.fail_unsubscribe.lock().unwrap() = true;
        }

        pub fn fail_release(&self) {
            *self.fail_release.lock().unwrap() = true;
        }
    }

    #[async_trait]
    impl ChangeFeed for FakeChangeFeed {
        async fn subscribe(&self, collection: &str, kinds: &[ChangeKind]) -> Result<Subscription> {
            self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
            if *self.fail_subscribe.lock().unwrap() {
                return Err(AppError::Subscription("channel error".to_string()));
            }

            *self.requested_kinds.lock().unwrap() = kinds.to_vec();
            let handle = SubscriptionHandle {
                id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
                collection: collection.to_string(),
            };
            let (tx, rx) = mpsc::channel(64);
            self.subscribers
                .lock()
                .unwrap()
                .push((handle.clone(), tx));

            Ok(Subscription { handle, events: rx })
        }

        async fn unsubscribe(&self, handle: &SubscriptionHandle) -> Result<()> {
            self.unsubscribe_calls.fetch_add(1, Ordering::SeqCst);
            if *self.fail_unsubscribe.lock().unwrap() {
                return Err(AppError::Subscription("unsubscribe failed".to_string()));
            }
            self.subscribers.lock().unwrap().retain(|(h, _)| h != handle);
            Ok(())
        }

        async fn release(&self, handle: SubscriptionHandle) -> Result<()> {
            self.release_calls.fetch_add(1, Ordering::SeqCst);
            if *self.fail_release.lock().unwrap() {
                return Err(AppError::Subscription("release failed".to_string()));
            }
            self.subscribers.lock().unwrap().retain(|(h, _)| *h != handle);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse_is_case_insensitive() {
        assert_eq!(ChangeKind::parse("insert"), Some(ChangeKind::Insert));
        assert_eq!(ChangeKind::parse("Update"), Some(ChangeKind::Update));
        assert_eq!(ChangeKind::parse(" DELETE "), Some(ChangeKind::Delete));
        assert_eq!(ChangeKind::parse("TRUNCATE"), None);
    }
}
