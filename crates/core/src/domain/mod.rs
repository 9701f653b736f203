// Domain Layer - Pure business logic and entities

pub mod change;
pub mod entry;
pub mod error;

// Re-exports
pub use change::QueueChange;
pub use entry::{EntryId, EntryStatus, NewEntry, QueueEntry, QUEUE_COLLECTION};
pub use error::DomainError;
