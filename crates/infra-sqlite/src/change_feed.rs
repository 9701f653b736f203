// SQLite ChangeFeed Implementation
// Each subscription gets a forwarder task from the broadcast bus to its own channel.

use crate::ChangeBus;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use tutorq_core::domain::QUEUE_COLLECTION;
use tutorq_core::error::{AppError, Result};
use tutorq_core::port::{ChangeFeed, ChangeKind, RawNotification, Subscription, SubscriptionHandle};

struct Registration {
    forwarder: JoinHandle<()>,
}

pub struct SqliteChangeFeed {
    bus: ChangeBus,
    buffer: usize,
    next_id: AtomicU64,
    registrations: Mutex<HashMap<u64, Registration>>,
}

impl SqliteChangeFeed {
    /// `buffer` bounds each subscriber's pending notifications
    pub fn new(bus: ChangeBus, buffer: usize) -> Self {
        Self {
            bus,
            buffer,
            next_id: AtomicU64::new(1),
            registrations: Mutex::new(HashMap::new()),
        }
    }

    pub fn registration_count(&self) -> usize {
        self.registrations.lock().unwrap().len()
    }
}

fn kind_of(notification: &RawNotification) -> Option<ChangeKind> {
    notification
        .get("eventType")
        .and_then(|v| v.as_str())
        .and_then(ChangeKind::parse)
}

async fn forward(
    id: u64,
    mut source: broadcast::Receiver<RawNotification>,
    sink: mpsc::Sender<RawNotification>,
    kinds: Vec<ChangeKind>,
) {
    loop {
        match source.recv().await {
            Ok(notification) => {
                let wanted = kind_of(&notification).map_or(false, |k| kinds.contains(&k));
                if wanted && sink.send(notification).await.is_err() {
                    debug!(subscription_id = id, "Subscriber went away");
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(subscription_id = id, skipped, "Subscriber lagged, notifications dropped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[async_trait]
impl ChangeFeed for SqliteChangeFeed {
    async fn subscribe(&self, collection: &str, kinds: &[ChangeKind]) -> Result<Subscription> {
        if collection != QUEUE_COLLECTION {
            return Err(AppError::Subscription(format!(
                "unknown collection: {}",
                collection
            )));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(self.buffer);
        let forwarder = tokio::spawn(forward(id, self.bus.subscribe(), tx, kinds.to_vec()));
        self.registrations
            .lock()
            .unwrap()
            .insert(id, Registration { forwarder });

        info!(subscription_id = id, collection, "Change feed subscription opened");
        Ok(Subscription {
            handle: SubscriptionHandle {
                id,
                collection: collection.to_string(),
            },
            events: rx,
        })
    }

    async fn unsubscribe(&self, handle: &SubscriptionHandle) -> Result<()> {
        let registrations = self.registrations.lock().unwrap();
        let registration = registrations.get(&handle.id).ok_or_else(|| {
            AppError::Subscription(format!("unknown subscription {}", handle.id))
        })?;
        registration.forwarder.abort();
        debug!(subscription_id = handle.id, "Change feed delivery stopped");
        Ok(())
    }

    async fn release(&self, handle: SubscriptionHandle) -> Result<()> {
        let registration = self
            .registrations
            .lock()
            .unwrap()
            .remove(&handle.id)
            .ok_or_else(|| AppError::Subscription(format!("unknown subscription {}", handle.id)))?;
        registration.forwarder.abort();
        info!(subscription_id = handle.id, "Change feed subscription released");
        Ok(())
    }
}
