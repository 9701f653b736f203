// Application Layer - Use Cases and Queue Synchronization

pub mod dashboard;
pub mod submission;
pub mod sync;

// Re-exports
pub use dashboard::TutorDashboard;
pub use submission::{SubmissionService, SubmitRequest};
pub use sync::{QueueState, QueueSynchronizer, SyncConfig, SyncHandle};
