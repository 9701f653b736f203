// Port Layer - Interfaces for external dependencies

pub mod change_feed;
pub mod id_provider; // For deterministic testing
pub mod queue_store;
pub mod session_gate;
pub mod time_provider;

// Re-exports
pub use change_feed::{ChangeFeed, ChangeKind, RawNotification, Subscription, SubscriptionHandle};
pub use id_provider::IdProvider;
pub use queue_store::QueueStore;
pub use session_gate::{LocalSessionGate, Session, SessionGate};
pub use time_provider::TimeProvider;
