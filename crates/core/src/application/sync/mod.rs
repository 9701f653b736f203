//! Queue Synchronizer
//!
//! Keeps a local, sorted copy of the queue in step with the backing store.
//! Two producers feed one task: the change feed (push) and a periodic full
//! reload (poll). Tutor actions and store outcomes go through the same task,
//! so every state transition is applied one at a time and published as a new
//! [`QueueState`] snapshot.

pub mod apply;
pub mod constants;
pub mod notification;
mod shutdown;
pub mod state;


pub use notification::normalize;
pub use state::QueueState;

use crate::domain::{EntryStatus, QueueChange, QueueEntry, QUEUE_COLLECTION};
use crate::error::{AppError, Result};
use crate::port::{ChangeFeed, ChangeKind, QueueStore, RawNotification, SubscriptionHandle};
use constants::{COMMAND_BUFFER, DEFAULT_RECONCILE_INTERVAL};
use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Synchronizer settings
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub collection: String,
    pub reconcile_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            collection: QUEUE_COLLECTION.to_string(),
            reconcile_interval: DEFAULT_RECONCILE_INTERVAL,
        }
    }
}

/// Factory for active synchronizer sessions.
///
/// Collaborators are injected so tests can substitute fakes.
pub struct QueueSynchronizer {
    store: Arc<dyn QueueStore>,
    feed: Arc<dyn ChangeFeed>,
    config: SyncConfig,
}

impl QueueSynchronizer {
    /// # Errors
    /// - AppError::Config when the reconcile interval is zero
    pub fn new(
        store: Arc<dyn QueueStore>,
        feed: Arc<dyn ChangeFeed>,
        config: SyncConfig,
    ) -> Result<Self> {
        if config.reconcile_interval.is_zero() {
            return Err(AppError::Config(
                "reconcile interval must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            store,
            feed,
            config,
        })
    }

    /// Subscribe, start the initial load and the reconciliation timer.
    ///
    /// A failed subscription is logged and the session continues on
    /// reconciliation alone.
    pub async fn activate(&self) -> SyncHandle {
        let (handle, events) = match self
            .feed
            .subscribe(&self.config.collection, &ChangeKind::ALL)
            .await
        {
            Ok(sub) => {
                info!(
                    collection = %self.config.collection,
                    subscription_id = sub.handle.id,
                    "Subscribed to change feed"
                );
                (Some(sub.handle), Some(sub.events))
            }
            Err(e) => {
                error!(
                    collection = %self.config.collection,
                    error = %e,
                    "Change feed subscription failed, relying on reconciliation"
                );
                (None, None)
            }
        };

        let (state_tx, state_rx) = watch::channel(QueueState::loading());
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = shutdown_channel();

        let actor = SyncActor {
            store: Arc::clone(&self.store),
            feed: Arc::clone(&self.feed),
            subscription: handle,
            events,
            state: state_tx,
            commands: command_rx,
            outcome_tx,
            outcomes: outcome_rx,
            pending_reloads: 0,
            action_error: None,
            reconcile_interval: self.config.reconcile_interval,
        };
        let task = tokio::spawn(actor.run(shutdown_rx));

        SyncHandle {
            state: state_rx,
            commands: command_tx,
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Handle to an active synchronizer. Dropping it also deactivates.
pub struct SyncHandle {
    state: watch::Receiver<QueueState>,
    commands: mpsc::Sender<Command>,
    shutdown: ShutdownSender,
    task: JoinHandle<()>,
}

impl SyncHandle {
    /// Latest published state
    pub fn snapshot(&self) -> QueueState {
        self.state.borrow().clone()
    }

    /// Receiver that is notified on every published state
    pub fn watch(&self) -> watch::Receiver<QueueState> {
        self.state.clone()
    }

    /// Mark an entry seen: local state first, then the store.
    ///
    /// Resolves once the store has answered.
    pub async fn mark_seen(&self, id: &str) -> Result<()> {
        self.request(|reply| Command::MarkSeen {
            id: id.to_string(),
            reply,
        })
        .await
    }

    /// Remove an entry: local state first, then the store.
    pub async fn remove(&self, id: &str) -> Result<()> {
        self.request(|reply| Command::Remove {
            id: id.to_string(),
            reply,
        })
        .await
    }

    /// Schedule a full reload now
    pub async fn refresh(&self) -> Result<()> {
        self.commands
            .send(Command::Refresh)
            .await
            .map_err(|_| AppError::Inactive)
    }

    /// Stop the timer, drop the subscription and wait for the task to finish.
    ///
    /// No state is published after this returns.
    pub async fn deactivate(self) {
        self.shutdown.shutdown();
        if let Err(e) = self.task.await {
            error!(error = ?e, "Queue synchronizer task ended abnormally");
        }
    }

    async fn request(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<()>>) -> Command,
    ) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(make(reply_tx))
            .await
            .map_err(|_| AppError::Inactive)?;
        reply_rx.await.map_err(|_| AppError::Inactive)?
    }
}

enum Command {
    MarkSeen {
        id: String,
        reply: oneshot::Sender<Result<()>>,
    },
    Remove {
        id: String,
        reply: oneshot::Sender<Result<()>>,
    },
    Refresh,
}

#[derive(Debug, Clone, Copy)]
enum ReloadCause {
    Initial,
    Reconcile,
    StaleNotification,
    MutationFailed,
    Requested,
}

enum Outcome {
    Loaded {
        cause: ReloadCause,
        result: Result<Vec<QueueEntry>>,
    },
    MutationFailed {
        action: &'static str,
        id: String,
        message: String,
    },
}

struct SyncActor {
    store: Arc<dyn QueueStore>,
    feed: Arc<dyn ChangeFeed>,
    subscription: Option<SubscriptionHandle>,
    events: Option<mpsc::Receiver<RawNotification>>,
    state: watch::Sender<QueueState>,
    commands: mpsc::Receiver<Command>,
    outcome_tx: mpsc::UnboundedSender<Outcome>,
    outcomes: mpsc::UnboundedReceiver<Outcome>,
    pending_reloads: usize,
    /// Last failed tutor action; outlives reloads until the next action
    action_error: Option<String>,
    reconcile_interval: Duration,
}

impl SyncActor {
    async fn run(mut self, mut shutdown: ShutdownToken) {
        info!(
            reconcile_interval_ms = self.reconcile_interval.as_millis() as u64,
            "Queue synchronizer started"
        );

        self.spawn_reload(ReloadCause::Initial);

        let period = self.reconcile_interval;
        let mut tick = interval_at(Instant::now() + period, period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if shutdown.is_shutdown() {
                break;
            }

            tokio::select! {
                biased;

                _ = shutdown.wait() => break,

                Some(outcome) = self.outcomes.recv() => self.on_outcome(outcome),

                command = self.commands.recv() => match command {
                    Some(command) => self.on_command(command),
                    // Every handle is gone
                    None => break,
                },

                raw = next_notification(&mut self.events) => match raw {
                    Some(raw) => self.on_notification(raw),
                    None => {
                        warn!("Change feed closed, relying on reconciliation");
                        self.events = None;
                    }
                },

                _ = tick.tick() => self.spawn_reload(ReloadCause::Reconcile),
            }
        }

        self.teardown().await;
    }

    fn on_notification(&mut self, raw: RawNotification) {
        let change = match notification::normalize(&raw) {
            Some(change) => change,
            None => {
                debug!(notification = %raw, "Ignoring notification");
                return;
            }
        };

        if change == QueueChange::Resync {
            self.spawn_reload(ReloadCause::StaleNotification);
            return;
        }

        debug!(kind = change.kind(), "Applying notification");
        self.state.send_if_modified(|state| {
            let next = apply::apply_change(&state.entries, change);
            if next == *state.entries {
                return false;
            }
            state.entries = Arc::new(next);
            true
        });
    }

    fn on_command(&mut self, command: Command) {
        self.clear_action_error();
        match command {
            Command::MarkSeen { id, reply } => {
                self.publish_entries(|entries| apply::mark_seen(entries, &id));
                let store = Arc::clone(&self.store);
                self.spawn_mutation("mark seen", id, reply, move |id: String| async move {
                    store.update_status(&id, EntryStatus::Seen).await
                });
            }
            Command::Remove { id, reply } => {
                self.publish_entries(|entries| apply::remove(entries, &id));
                let store = Arc::clone(&self.store);
                self.spawn_mutation("remove", id, reply, move |id: String| async move {
                    store.delete(&id).await
                });
            }
            Command::Refresh => self.spawn_reload(ReloadCause::Requested),
        }
    }

    fn on_outcome(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Loaded { cause, result } => {
                self.pending_reloads = self.pending_reloads.saturating_sub(1);
                let loading = self.pending_reloads > 0;

                match result {
                    Ok(entries) => {
                        debug!(?cause, count = entries.len(), "Queue reloaded");
                        let entries = Arc::new(apply::sorted(entries));
                        let last_error = self.action_error.clone();
                        self.state.send_modify(|state| {
                            state.entries = entries;
                            state.loading = loading;
                            state.last_error = last_error;
                        });
                    }
                    Err(e) => {
                        warn!(?cause, error = %e, "Queue reload failed, keeping last known entries");
                        self.state.send_modify(|state| {
                            state.loading = loading;
                            state.last_error = Some(e.to_string());
                        });
                    }
                }
            }
            Outcome::MutationFailed {
                action,
                id,
                message,
            } => {
                error!(
                    entry_id = %id,
                    action,
                    error = %message,
                    "Store rejected tutor action, resynchronizing"
                );
                let failure = format!("Failed to {} {}: {}", action, id, message);
                self.action_error = Some(failure.clone());
                self.state.send_modify(|state| state.last_error = Some(failure));
                self.spawn_reload(ReloadCause::MutationFailed);
            }
        }
    }

    fn clear_action_error(&mut self) {
        if let Some(previous) = self.action_error.take() {
            self.state.send_if_modified(|state| {
                if state.last_error.as_deref() != Some(previous.as_str()) {
                    return false;
                }
                state.last_error = None;
                true
            });
        }
    }

    fn publish_entries(&mut self, f: impl FnOnce(&[QueueEntry]) -> Vec<QueueEntry>) {
        self.state.send_modify(|state| {
            state.entries = Arc::new(f(&state.entries));
        });
    }

    /// Fetch in the background; the result comes back as an `Outcome`.
    ///
    /// After teardown the receiver is gone and the result is dropped.
    fn spawn_reload(&mut self, cause: ReloadCause) {
        self.pending_reloads += 1;
        if !self.state.borrow().loading {
            self.state.send_modify(|state| state.loading = true);
        }

        let store = Arc::clone(&self.store);
        let outcome_tx = self.outcome_tx.clone();
        tokio::spawn(async move {
            let result = store.fetch_all().await;
            if outcome_tx.send(Outcome::Loaded { cause, result }).is_err() {
                debug!(?cause, "Discarding fetch result after deactivation");
            }
        });
    }

    fn spawn_mutation<F, Fut>(
        &self,
        action: &'static str,
        id: String,
        reply: oneshot::Sender<Result<()>>,
        call: F,
    ) where
        F: FnOnce(String) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        let outcome_tx = self.outcome_tx.clone();
        tokio::spawn(async move {
            let result = call(id.clone()).await;
            match &result {
                Ok(()) => info!(entry_id = %id, action, "Tutor action confirmed"),
                Err(e) => {
                    let _ = outcome_tx.send(Outcome::MutationFailed {
                        action,
                        id: id.clone(),
                        message: e.to_string(),
                    });
                }
            }
            // Caller may have stopped waiting
            let _ = reply.send(result);
        });
    }

    async fn teardown(&mut self) {
        self.events = None;
        if let Some(handle) = self.subscription.take() {
            if let Err(e) = self.feed.unsubscribe(&handle).await {
                warn!(subscription_id = handle.id, error = %e, "Unsubscribe failed");
            }
            let id = handle.id;
            if let Err(e) = self.feed.release(handle).await {
                warn!(subscription_id = id, error = %e, "Releasing subscription failed");
            }
        }
        info!("Queue synchronizer stopped");
    }
}

async fn next_notification(
    events: &mut Option<mpsc::Receiver<RawNotification>>,
) -> Option<RawNotification> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
