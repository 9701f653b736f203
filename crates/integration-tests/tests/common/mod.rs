//! Shared wiring for the end-to-end tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;
use tutorq_core::application::{QueueState, QueueSynchronizer, SyncConfig, SyncHandle};
use tutorq_core::domain::QUEUE_COLLECTION;
use tutorq_core::port::id_provider::UuidProvider;
use tutorq_core::port::time_provider::SystemTimeProvider;
use tutorq_infra_sqlite::{create_pool, run_migrations, ChangeBus, SqliteChangeFeed, SqliteQueueStore};

/// Store, feed and bus sharing one database
pub struct Stack {
    pub store: Arc<SqliteQueueStore>,
    pub feed: Arc<SqliteChangeFeed>,
    pub bus: ChangeBus,
}

impl Stack {
    pub async fn open(database_url: &str) -> Self {
        let pool = create_pool(database_url).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let bus = ChangeBus::new(64);
        let store = Arc::new(SqliteQueueStore::new(
            pool,
            bus.clone(),
            Arc::new(UuidProvider),
            Arc::new(SystemTimeProvider),
        ));
        let feed = Arc::new(SqliteChangeFeed::new(bus.clone(), 64));
        Self { store, feed, bus }
    }

    pub async fn in_memory() -> Self {
        Self::open("sqlite::memory:").await
    }

    pub fn synchronizer(&self, reconcile_interval: Duration) -> QueueSynchronizer {
        QueueSynchronizer::new(
            self.store.clone(),
            self.feed.clone(),
            SyncConfig {
                collection: QUEUE_COLLECTION.to_string(),
                reconcile_interval,
            },
        )
        .unwrap()
    }
}

/// Wait until the published state satisfies `condition`
pub async fn settle(
    rx: &mut watch::Receiver<QueueState>,
    condition: impl FnMut(&QueueState) -> bool,
) -> QueueState {
    timeout(Duration::from_secs(5), rx.wait_for(condition))
        .await
        .expect("state never settled")
        .expect("synchronizer stopped")
        .clone()
}

pub async fn loaded(handle: &SyncHandle) -> QueueState {
    settle(&mut handle.watch(), |s| !s.loading).await
}

/// Fresh file database path under the system temp dir
pub fn temp_database_url() -> (String, std::path::PathBuf) {
    let path = std::env::temp_dir().join(format!("tutorq-test-{}.db", uuid::Uuid::new_v4()));
    (format!("sqlite://{}", path.display()), path)
}
