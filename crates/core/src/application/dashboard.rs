// Tutor Dashboard - session-gated access to the live queue

use crate::application::sync::{QueueSynchronizer, SyncHandle};
use crate::error::{AppError, Result};
use crate::port::SessionGate;
use std::sync::Arc;
use tracing::info;

/// Opens the synchronizer only for a signed-in tutor
pub struct TutorDashboard {
    gate: Arc<dyn SessionGate>,
    synchronizer: QueueSynchronizer,
}

impl TutorDashboard {
    pub fn new(gate: Arc<dyn SessionGate>, synchronizer: QueueSynchronizer) -> Self {
        Self { gate, synchronizer }
    }

    /// Activate the live queue
    ///
    /// # Errors
    /// - AppError::Unauthorized when no session is present
    pub async fn open(&self) -> Result<SyncHandle> {
        let session = self.gate.current_session().await.ok_or_else(|| {
            AppError::Unauthorized("sign in to view the queue".to_string())
        })?;

        info!(email = %session.email, "Opening tutor dashboard");
        Ok(self.synchronizer.activate().await)
    }

    pub async fn close(&self, handle: SyncHandle) {
        handle.deactivate().await;
    }

    /// Close the live queue, then end the session
    pub async fn sign_out(&self, handle: SyncHandle) -> Result<()> {
        self.close(handle).await;
        self.gate.sign_out().await
    }
}
