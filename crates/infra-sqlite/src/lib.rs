// Tutor Queue Infrastructure - SQLite Adapter
// Implements: QueueStore, ChangeFeed

mod change_bus;
mod change_feed;
mod connection;
mod migration;
mod queue_store;

pub use change_bus::ChangeBus;
pub use change_feed::SqliteChangeFeed;
pub use connection::create_pool;
pub use migration::run_migrations;
pub use queue_store::SqliteQueueStore;

// Note: sqlx::Error conversion is handled by wrapping in helper functions
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for AppError here)
