//! Live queue over SQLite: submissions, notifications and tutor actions

mod common;

use common::{loaded, settle, Stack};
use std::sync::Arc;
use std::time::Duration;
use tutorq_core::application::sync::normalize;
use tutorq_core::application::{SubmissionService, SubmitRequest, TutorDashboard};
use tutorq_core::domain::{EntryStatus, QueueChange};
use tutorq_core::error::AppError;
use tutorq_core::port::time_provider::SystemTimeProvider;
use tutorq_core::port::{LocalSessionGate, QueueStore, SessionGate};

// Long enough that only notifications can explain a change
const NO_POLLING: Duration = Duration::from_secs(3600);

fn request(name: &str, topic: Option<&str>) -> SubmitRequest {
    SubmitRequest {
        student_name: name.to_string(),
        topic_area: topic.map(str::to_string),
    }
}

#[tokio::test]
async fn test_submission_reaches_open_dashboard() {
    let stack = Stack::in_memory().await;
    let submissions = SubmissionService::new(stack.store.clone());
    let earlier = submissions.submit(request("Alice", Some("recursion"))).await.unwrap();

    let handle = stack.synchronizer(NO_POLLING).activate().await;
    let mut rx = handle.watch();
    assert_eq!(loaded(&handle).await.ids(), vec![earlier.id.as_str()]);

    let later = submissions.submit(request("  Bob ", Some("   "))).await.unwrap();
    let state = settle(&mut rx, |s| s.entries.len() == 2).await;

    assert_eq!(state.ids(), vec![earlier.id.as_str(), later.id.as_str()]);
    let bob = state.get(&later.id).unwrap();
    assert_eq!(bob.student_name, "Bob");
    assert_eq!(bob.topic_area, None);
    assert_eq!(bob.status, EntryStatus::Waiting);
    assert_eq!(state.waiting_count(), 2);

    handle.deactivate().await;
}

#[tokio::test]
async fn test_invalid_submission_changes_nothing() {
    let stack = Stack::in_memory().await;
    let submissions = SubmissionService::new(stack.store.clone());

    let err = submissions.submit(request("   ", None)).await.unwrap_err();
    assert!(err.to_string().contains("Student name is required."));
    assert!(stack.store.fetch_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_tutor_actions_are_persisted() {
    let stack = Stack::in_memory().await;
    let submissions = SubmissionService::new(stack.store.clone());
    let alice = submissions.submit(request("Alice", None)).await.unwrap();
    let bob = submissions.submit(request("Bob", None)).await.unwrap();

    let handle = stack.synchronizer(NO_POLLING).activate().await;
    let mut rx = handle.watch();
    loaded(&handle).await;

    handle.mark_seen(&alice.id).await.unwrap();
    handle.remove(&bob.id).await.unwrap();

    let state = settle(&mut rx, |s| s.entries.len() == 1).await;
    assert_eq!(state.seen_count(), 1);
    assert!(state.last_error.is_none());

    let stored = stack.store.fetch_all().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, alice.id);
    assert_eq!(stored[0].status, EntryStatus::Seen);

    handle.deactivate().await;
}

#[tokio::test]
async fn test_failed_action_reports_and_resyncs() {
    let stack = Stack::in_memory().await;
    let handle = stack.synchronizer(NO_POLLING).activate().await;
    let mut rx = handle.watch();
    loaded(&handle).await;

    let err = handle.mark_seen("missing").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    // The follow-up reload lands and the failure stays on display
    let state = settle(&mut rx, |s| !s.loading && s.last_error.is_some()).await;
    assert!(state.is_empty());
    assert!(state.last_error.unwrap().starts_with("Failed to mark seen missing"));

    handle.refresh().await.unwrap();
    settle(&mut rx, |s| !s.loading && s.last_error.is_none()).await;

    handle.deactivate().await;
}

#[tokio::test]
async fn test_store_notifications_normalize() {
    let stack = Stack::in_memory().await;
    let mut raw = stack.bus.subscribe();

    let entry = stack.store.insert("Alice", Some("graphs")).await.unwrap();
    stack.store.update_status(&entry.id, EntryStatus::Seen).await.unwrap();
    stack.store.delete(&entry.id).await.unwrap();

    match normalize(&raw.recv().await.unwrap()) {
        Some(QueueChange::Insert(inserted)) => assert_eq!(inserted, entry),
        other => panic!("unexpected change: {:?}", other),
    }
    match normalize(&raw.recv().await.unwrap()) {
        Some(QueueChange::Update(updated)) => assert_eq!(updated.status, EntryStatus::Seen),
        other => panic!("unexpected change: {:?}", other),
    }
    assert_eq!(
        normalize(&raw.recv().await.unwrap()),
        Some(QueueChange::Delete(entry.id.clone()))
    );
}

#[tokio::test]
async fn test_dashboard_session_lifecycle() {
    let stack = Stack::in_memory().await;
    let gate = Arc::new(LocalSessionGate::new(
        "tutor@example.com",
        "secret",
        Arc::new(SystemTimeProvider),
    ));
    let dashboard = TutorDashboard::new(gate.clone(), stack.synchronizer(NO_POLLING));

    assert!(matches!(dashboard.open().await, Err(AppError::Unauthorized(_))));
    assert!(gate.sign_in("tutor@example.com", "wrong").await.is_err());

    gate.sign_in(" Tutor@Example.com ", "secret").await.unwrap();
    let handle = dashboard.open().await.unwrap();
    loaded(&handle).await;
    assert_eq!(stack.feed.registration_count(), 1);

    dashboard.sign_out(handle).await.unwrap();
    assert_eq!(stack.feed.registration_count(), 0);
    assert!(gate.current_session().await.is_none());
}
