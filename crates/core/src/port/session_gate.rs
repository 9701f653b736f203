// Session Gate Port
// Only answers "is a tutor signed in"; credential validation lives behind it.

use crate::error::{AppError, Result};
use crate::port::TimeProvider;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// An authenticated tutor session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub email: String,
    pub signed_in_at: DateTime<Utc>,
}

/// Authentication gate port
#[async_trait]
pub trait SessionGate: Send + Sync {
    /// Current session, if any
    async fn current_session(&self) -> Option<Session>;

    /// Sign in with email and password
    ///
    /// # Errors
    /// - AppError::Unauthorized on bad credentials
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session>;

    /// End the current session (no-op when signed out)
    async fn sign_out(&self) -> Result<()>;
}

/// Single-account gate for local deployments
pub struct LocalSessionGate {
    email: String,
    password: String,
    session: Mutex<Option<Session>>,
    time_provider: Arc<dyn TimeProvider>,
}

impl LocalSessionGate {
    pub fn new(
        email: impl Into<String>,
        password: impl Into<String>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            session: Mutex::new(None),
            time_provider,
        }
    }
}

#[async_trait]
impl SessionGate for LocalSessionGate {
    async fn current_session(&self) -> Option<Session> {
        self.session.lock().unwrap().clone()
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let email = email.trim();
        if !email.eq_ignore_ascii_case(&self.email) || password != self.password {
            warn!(email = %email, "Rejected tutor sign-in");
            return Err(AppError::Unauthorized(
                "Invalid login credentials".to_string(),
            ));
        }

        let session = Session {
            email: self.email.clone(),
            signed_in_at: self.time_provider.now(),
        };
        *self.session.lock().unwrap() = Some(session.clone());
        info!(email = %session.email, "Tutor signed in");
        Ok(session)
    }

    async fn sign_out(&self) -> Result<()> {
        if let Some(session) = self.session.lock().unwrap().take() {
            info!(email = %session.email, "Tutor signed out");
        }
        Ok(())
    }
}
