use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use tokio::sync::Notify;

use crate::config::{DEFAULT_SUCCESS_MESSAGE, DEFAULT_VALIDATION_MESSAGE, FormSessionConfig};
use crate::record::{FieldMap, FieldValue};
use crate::session::collaborator::{InMemoryRecordStore, RecordSaver, RecordSource};
use crate::session::controller::FormSession;
use crate::session::model::{
    MessageKind, Mode, RefreshOutcome, ReseedOutcome, SaveOutcome, Status, StatusMessage,
};
use crate::validation::{FieldErrors, RuleSet};

// Mock saver recording every call, with optional one-shot failure and gate
#[derive(Default)]
struct MockSaver {
    calls: Mutex<Vec<FieldMap>>,
    fail_with: Mutex<Option<String>>,
    gate: Option<Arc<Notify>>,
}

impl MockSaver {
    fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    fn fail_next(&self, reason: &str) {
        *self.fail_with.lock().unwrap() = Some(reason.to_string());
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn last_call(&self) -> Option<FieldMap> {
        self.calls.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl RecordSaver<FieldMap> for MockSaver {
    async fn save(&self, data: &FieldMap) -> Result<()> {
        self.calls.lock().unwrap().push(data.clone());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        match self.fail_with.lock().unwrap().take() {
            Some(reason) => Err(anyhow!(reason)),
            None => Ok(()),
        }
    }
}

struct FailingSource;

#[async_trait]
impl RecordSource<FieldMap> for FailingSource {
    async fn fetch(&self) -> Result<FieldMap> {
        Err(anyhow!("Network error"))
    }
}

fn blank_profile() -> FieldMap {
    FieldMap::new().with("fullName", "").with("email", "")
}

fn profile_rules() -> RuleSet {
    RuleSet::new()
        .required("fullName", "Full name is required")
        .email("email", "Email is required", "Please enter a valid email address")
}

fn session_with(initial: FieldMap, saver: Arc<MockSaver>) -> FormSession<FieldMap> {
    FormSession::builder(initial, saver).build()
}

fn auto_saving_session(saver: Arc<MockSaver>, delay_ms: u64) -> FormSession<FieldMap> {
    FormSession::builder(blank_profile(), saver)
        .config(FormSessionConfig::default().with_auto_save(Duration::from_millis(delay_ms)))
        .build()
}

#[test]
fn test_fresh_session_is_clean_and_viewing() {
    let session = session_with(blank_profile(), Arc::new(MockSaver::default()));
    let snapshot = session.snapshot();

    assert!(!snapshot.is_dirty);
    assert_eq!(snapshot.mode, Mode::Viewing);
    assert!(snapshot.errors.is_empty());
    assert_eq!(snapshot.status, Status::Idle);
    assert!(snapshot.message.is_none());
    assert_eq!(snapshot.current, snapshot.original);
}

#[test]
fn test_initial_mode_from_config() {
    let session = FormSession::builder(blank_profile(), Arc::new(MockSaver::default()))
        .config(FormSessionConfig::default().with_initial_mode(Mode::Editing))
        .build();
    assert!(session.is_editing());
    assert!(!session.start_editing());
}

#[test]
fn test_dirty_tracks_structural_difference() {
    let session = session_with(blank_profile(), Arc::new(MockSaver::default()));
    session.start_editing();

    assert!(session.update_field(FieldMap::new().with("fullName", "Ada")));
    assert!(session.is_dirty());

    // Inverse patch restores the baseline
    session.update_field(FieldMap::new().with("fullName", ""));
    assert!(!session.is_dirty());
}

#[test]
fn test_tag_order_does_not_make_session_dirty() {
    let initial = FieldMap::new().with("tags", FieldValue::tags(["ops", "billing"]));
    let session = session_with(initial, Arc::new(MockSaver::default()));
    session.start_editing();

    session.update_with(|current| {
        current
            .clone()
            .with("tags", FieldValue::tags(["billing", "ops"]))
    });
    assert!(!session.is_dirty());
}

#[test]
fn test_update_ignored_outside_editing() {
    let session = session_with(blank_profile(), Arc::new(MockSaver::default()));

    assert!(!session.update_field(FieldMap::new().with("fullName", "Ada")));
    assert_eq!(session.current(), blank_profile());
}

#[test]
fn test_cancel_restores_original() {
    let session = session_with(blank_profile(), Arc::new(MockSaver::default()));
    session.start_editing();
    session.update_field(FieldMap::new().with("fullName", "Ada"));
    session.update_field(FieldMap::new().with("email", "ada@example.com"));

    assert!(session.cancel());
    assert_eq!(session.current(), blank_profile());
    assert!(!session.is_dirty());
    assert_eq!(session.mode(), Mode::Viewing);
    assert!(!session.cancel());
}

#[tokio::test]
async fn test_invalid_record_never_reaches_saver() {
    let saver = Arc::new(MockSaver::default());
    let session = FormSession::builder(blank_profile(), saver.clone())
        .validator(|_: &FieldMap| {
            let mut errors = FieldErrors::new();
            errors.insert("fullName".to_string(), "always wrong".to_string());
            errors
        })
        .build();
    session.start_editing();

    let outcome = session.save().await;

    assert!(matches!(outcome, SaveOutcome::Invalid(_)));
    assert_eq!(saver.call_count(), 0);
    assert_eq!(session.mode(), Mode::Editing);
    assert_eq!(
        session.message(),
        Some(StatusMessage::error(DEFAULT_VALIDATION_MESSAGE))
    );
}

#[tokio::test]
async fn test_blank_profile_reports_field_errors() {
    let saver = Arc::new(MockSaver::default());
    let session = FormSession::builder(blank_profile(), saver.clone())
        .validator(profile_rules())
        .build();
    session.start_editing();

    let outcome = session.save().await;

    let mut expected = FieldErrors::new();
    expected.insert("fullName".to_string(), "Full name is required".to_string());
    expected.insert("email".to_string(), "Email is required".to_string());
    assert_eq!(outcome, SaveOutcome::Invalid(expected.clone()));
    assert_eq!(session.errors(), expected);
    assert_eq!(session.mode(), Mode::Editing);
    assert_eq!(saver.call_count(), 0);
}

#[tokio::test]
async fn test_successful_save_commits_and_returns_to_viewing() {
    let saver = Arc::new(MockSaver::default());
    let session = FormSession::builder(blank_profile(), saver.clone())
        .validator(profile_rules())
        .build();
    session.start_editing();
    session.update_field(
        FieldMap::new()
            .with("fullName", "Ada")
            .with("email", "ada@example.com"),
    );

    let outcome = session.save().await;

    let expected = FieldMap::new()
        .with("fullName", "Ada")
        .with("email", "ada@example.com");
    assert!(outcome.is_saved());
    assert_eq!(session.original(), expected);
    assert_eq!(saver.last_call(), Some(expected));
    assert_eq!(session.mode(), Mode::Viewing);
    assert!(!session.is_dirty());
    assert!(session.errors().is_empty());
    assert_eq!(
        session.message(),
        Some(StatusMessage::success(DEFAULT_SUCCESS_MESSAGE))
    );
}

#[tokio::test]
async fn test_custom_success_message() {
    let session = FormSession::builder(blank_profile(), Arc::new(MockSaver::default()))
        .config(FormSessionConfig::default().with_success_message("Profile updated"))
        .build();
    session.start_editing();
    session.update_field(FieldMap::new().with("fullName", "Ada"));
    session.save().await;

    assert_eq!(session.message().unwrap().text, "Profile updated");
}

#[tokio::test]
async fn test_committed_baseline_is_a_copy() {
    let session = session_with(blank_profile(), Arc::new(MockSaver::default()));
    session.start_editing();
    session.update_field(FieldMap::new().with("fullName", "Ada"));
    session.save().await;

    session.start_editing();
    session.update_field(FieldMap::new().with("fullName", "Grace"));

    assert_eq!(session.original().text("fullName"), "Ada");
    assert!(session.is_dirty());
}

#[tokio::test]
async fn test_save_failure_keeps_edits_and_stays_usable() {
    let saver = Arc::new(MockSaver::default());
    let session = session_with(blank_profile(), saver.clone());
    session.start_editing();
    session.update_field(FieldMap::new().with("fullName", "Ada"));
    saver.fail_next("Email already taken");

    let outcome = session.save().await;

    match outcome {
        SaveOutcome::Failed(err) => assert!(err.is_operation()),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(session.mode(), Mode::Editing);
    assert_eq!(session.current().text("fullName"), "Ada");
    assert_eq!(session.original().text("fullName"), "");
    assert_eq!(
        session.message(),
        Some(StatusMessage::error("Email already taken"))
    );
    assert_eq!(session.status(), Status::Idle);

    // Retry succeeds
    assert!(session.save().await.is_saved());
    assert_eq!(saver.call_count(), 2);
}

#[tokio::test]
async fn test_save_while_saving_is_skipped() {
    let gate = Arc::new(Notify::new());
    let saver = Arc::new(MockSaver::gated(gate.clone()));
    let session = session_with(blank_profile(), saver.clone());
    session.start_editing();
    session.update_field(FieldMap::new().with("fullName", "Ada"));

    let first = tokio::spawn({
        let session = session.clone();
        async move { session.save().await }
    });
    while !session.is_saving() {
        tokio::task::yield_now().await;
    }

    assert_eq!(session.save().await, SaveOutcome::Skipped);
    assert_eq!(session.refresh().await, RefreshOutcome::Unavailable);

    gate.notify_one();
    assert!(first.await.unwrap().is_saved());
    assert_eq!(saver.call_count(), 1);
}

#[tokio::test]
async fn test_errors_clear_once_data_validates() {
    let session = FormSession::builder(blank_profile(), Arc::new(MockSaver::default()))
        .validator(profile_rules())
        .build();
    session.start_editing();
    session.save().await;
    assert_eq!(session.errors().len(), 2);

    session.update_field(FieldMap::new().with("fullName", "Ada"));
    assert_eq!(session.errors().len(), 1);
    assert!(session.errors().contains_key("email"));

    session.update_field(FieldMap::new().with("email", "ada@example.com"));
    assert!(session.errors().is_empty());
}

#[tokio::test]
async fn test_update_keeps_error_message() {
    let saver = Arc::new(MockSaver::default());
    let session = session_with(blank_profile(), saver.clone());
    session.start_editing();
    session.update_field(FieldMap::new().with("fullName", "Ada"));
    saver.fail_next("Server unavailable");
    session.save().await;

    session.update_field(FieldMap::new().with("fullName", "Ada L."));
    assert_eq!(
        session.message(),
        Some(StatusMessage::error("Server unavailable"))
    );

    session.dismiss_message();
    assert!(session.message().is_none());
}

#[tokio::test]
async fn test_start_editing_clears_success_message() {
    let session = session_with(blank_profile(), Arc::new(MockSaver::default()));
    session.start_editing();
    session.update_field(FieldMap::new().with("fullName", "Ada"));
    session.save().await;
    assert!(session.message().unwrap().is_success());

    session.start_editing();
    assert!(session.message().is_none());
}

#[test]
fn test_reset_keeps_mode() {
    let session = session_with(blank_profile(), Arc::new(MockSaver::default()));
    session.start_editing();
    session.update_field(FieldMap::new().with("fullName", "Ada"));
    session.set_field_error("fullName", "Taken");

    session.reset();

    assert_eq!(session.mode(), Mode::Editing);
    assert!(!session.is_dirty());
    assert!(session.errors().is_empty());
}

#[test]
fn test_field_errors_do_not_touch_mode_or_message() {
    let session = session_with(blank_profile(), Arc::new(MockSaver::default()));
    session.start_editing();

    session.set_field_error("email", "Email already registered");
    assert_eq!(session.errors()["email"], "Email already registered");
    assert_eq!(session.mode(), Mode::Editing);
    assert!(session.message().is_none());

    assert!(session.clear_field_error("email"));
    assert!(!session.clear_field_error("email"));
    assert!(session.errors().is_empty());
}

#[tokio::test]
async fn test_refresh_without_source_is_noop() {
    let session = session_with(blank_profile(), Arc::new(MockSaver::default()));
    assert_eq!(session.refresh().await, RefreshOutcome::Unavailable);
    assert!(session.message().is_none());
}

#[tokio::test]
async fn test_refresh_overwrites_both_snapshots() {
    let store = Arc::new(InMemoryRecordStore::new(blank_profile()));
    let session = FormSession::builder(blank_profile(), store.clone())
        .source(store.clone())
        .build();
    session.start_editing();
    session.update_field(FieldMap::new().with("fullName", "Unsaved"));
    session.set_field_error("email", "bad");

    let fresh = FieldMap::new()
        .with("fullName", "Server")
        .with("email", "s@example.com");
    store.replace(fresh.clone());

    assert!(session.refresh().await.is_refreshed());
    assert_eq!(session.current(), fresh);
    assert_eq!(session.original(), fresh);
    assert!(session.errors().is_empty());
    assert!(session.message().is_none());
    // Mode is untouched
    assert_eq!(session.mode(), Mode::Editing);
    assert_eq!(store.fetch_count(), 1);
}

#[tokio::test]
async fn test_refresh_failure_surfaces_reason() {
    let session = FormSession::builder(blank_profile(), Arc::new(MockSaver::default()))
        .source(Arc::new(FailingSource))
        .build();
    session.start_editing();
    session.update_field(FieldMap::new().with("fullName", "Ada"));

    let outcome = session.refresh().await;

    assert!(matches!(outcome, RefreshOutcome::Failed(_)));
    let message = session.message().unwrap();
    assert_eq!(message.kind, MessageKind::Error);
    assert_eq!(message.text, "Network error");
    assert_eq!(session.current().text("fullName"), "Ada");
    assert_eq!(session.status(), Status::Idle);
}

#[test]
fn test_reseed_applies_when_clean() {
    let session = session_with(blank_profile(), Arc::new(MockSaver::default()));
    let fetched = FieldMap::new().with("fullName", "Ada").with("email", "");

    assert_eq!(session.reseed(fetched.clone()), ReseedOutcome::Applied);
    assert_eq!(session.original(), fetched);
    assert_eq!(session.current(), fetched);
    assert_eq!(session.reseed(fetched), ReseedOutcome::Unchanged);
}

#[test]
fn test_reseed_deferred_during_unsaved_edits() {
    let session = session_with(blank_profile(), Arc::new(MockSaver::default()));
    session.start_editing();
    session.update_field(FieldMap::new().with("fullName", "Typing"));
    let fetched = FieldMap::new().with("fullName", "Ada").with("email", "");

    assert_eq!(session.reseed(fetched.clone()), ReseedOutcome::Deferred);
    assert_eq!(session.current().text("fullName"), "Typing");
    assert!(session.has_pending_reseed());

    // Cancelling the edit picks up the deferred data
    session.cancel();
    assert_eq!(session.original(), fetched);
    assert_eq!(session.current(), fetched);
    assert!(!session.has_pending_reseed());
}

#[test]
fn test_reseed_back_to_baseline_drops_deferred_data() {
    let session = session_with(blank_profile(), Arc::new(MockSaver::default()));
    session.start_editing();
    session.update_field(FieldMap::new().with("fullName", "Typing"));
    let remote_edit = blank_profile().with("email", "old@remote.io");

    assert_eq!(session.reseed(remote_edit), ReseedOutcome::Deferred);
    assert_eq!(session.reseed(blank_profile()), ReseedOutcome::Unchanged);
    assert!(!session.has_pending_reseed());

    session.cancel();
    assert_eq!(session.current(), blank_profile());
    assert_eq!(session.current().text("email"), "");
}

#[tokio::test]
async fn test_save_drops_deferred_reseed() {
    let session = session_with(blank_profile(), Arc::new(MockSaver::default()));
    session.start_editing();
    session.update_field(FieldMap::new().with("fullName", "Mine"));
    session.reseed(FieldMap::new().with("fullName", "Theirs"));

    session.save().await;

    assert!(!session.has_pending_reseed());
    assert_eq!(session.original().text("fullName"), "Mine");
}

#[test]
fn test_force_reseed_discards_edits() {
    let session = session_with(blank_profile(), Arc::new(MockSaver::default()));
    session.start_editing();
    session.update_field(FieldMap::new().with("fullName", "Typing"));

    session.force_reseed(FieldMap::new().with("fullName", "Ada"));

    assert_eq!(session.current().text("fullName"), "Ada");
    assert!(!session.is_dirty());
}

#[tokio::test(start_paused = true)]
async fn test_auto_save_debounces_rapid_updates() {
    let saver = Arc::new(MockSaver::default());
    let session = auto_saving_session(saver.clone(), 500);
    session.start_editing();

    session.update_field(FieldMap::new().with("fullName", "Ad"));
    tokio::time::sleep(Duration::from_millis(100)).await;
    session.update_field(FieldMap::new().with("fullName", "Ada"));
    assert!(session.has_pending_auto_save());

    tokio::time::sleep(Duration::from_millis(1000)).await;

    assert_eq!(saver.call_count(), 1);
    assert_eq!(saver.last_call().unwrap().text("fullName"), "Ada");
    assert_eq!(session.mode(), Mode::Viewing);
    assert!(!session.has_pending_auto_save());
}

#[tokio::test(start_paused = true)]
async fn test_edits_during_auto_save_are_saved_next() {
    let gate = Arc::new(Notify::new());
    let saver = Arc::new(MockSaver::gated(gate.clone()));
    let session = auto_saving_session(saver.clone(), 500);
    session.start_editing();

    session.update_field(FieldMap::new().with("fullName", "Ada"));
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(session.is_saving());

    // Typed while the first save is still running
    session.update_field(FieldMap::new().with("fullName", "Ada Lovelace"));
    gate.notify_one();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(session.original().text("fullName"), "Ada");
    assert_eq!(session.mode(), Mode::Editing);
    assert!(session.is_dirty());
    assert!(session.has_pending_auto_save());

    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert_eq!(saver.call_count(), 2);
    gate.notify_one();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(saver.last_call().unwrap().text("fullName"), "Ada Lovelace");
    assert_eq!(session.mode(), Mode::Viewing);
    assert!(!session.is_dirty());
    assert!(!session.has_pending_auto_save());
}

#[tokio::test(start_paused = true)]
async fn test_auto_save_skipped_when_back_at_baseline() {
    let saver = Arc::new(MockSaver::default());
    let session = auto_saving_session(saver.clone(), 200);
    session.start_editing();

    session.update_field(FieldMap::new().with("fullName", "Ada"));
    session.update_field(FieldMap::new().with("fullName", ""));
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(saver.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_and_immediate_save_stop_auto_save() {
    let saver = Arc::new(MockSaver::default());
    let session = auto_saving_session(saver.clone(), 200);

    session.start_editing();
    session.update_field(FieldMap::new().with("fullName", "Ada"));
    session.cancel();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(saver.call_count(), 0);

    session.start_editing();
    session.update_field(FieldMap::new().with("fullName", "Ada"));
    assert!(session.save().await.is_saved());
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(saver.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_dispose_cancels_pending_auto_save() {
    let saver = Arc::new(MockSaver::default());
    let session = auto_saving_session(saver.clone(), 200);
    session.start_editing();
    session.update_field(FieldMap::new().with("fullName", "Ada"));

    session.dispose();
    session.update_field(FieldMap::new().with("fullName", "Ada L."));
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert!(session.is_disposed());
    assert_eq!(saver.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_last_handle_cancels_auto_save() {
    let saver = Arc::new(MockSaver::default());
    let session = auto_saving_session(saver.clone(), 200);
    session.start_editing();
    session.update_field(FieldMap::new().with("fullName", "Ada"));

    drop(session);
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(saver.call_count(), 0);
}

#[tokio::test]
async fn test_subscribers_see_changes() {
    let session = session_with(blank_profile(), Arc::new(MockSaver::default()));
    let mut rx = session.subscribe();

    session.start_editing();
    rx.changed().await.unwrap();
    assert!(rx.borrow_and_update().is_editing());

    session.update_field(FieldMap::new().with("fullName", "Ada"));
    rx.changed().await.unwrap();
    assert!(rx.borrow_and_update().is_dirty);
}

#[test]
fn test_dirty_fields() {
    let session = session_with(blank_profile(), Arc::new(MockSaver::default()));
    session.start_editing();
    session.update_field(FieldMap::new().with("email", "ada@example.com"));

    assert_eq!(session.dirty_fields(), vec!["email".to_string()]);
}

#[test]
fn test_snapshot_serializes_for_front_end() {
    let session = session_with(blank_profile(), Arc::new(MockSaver::default()));
    session.start_editing();
    let json = serde_json::to_value(session.snapshot()).unwrap();

    assert_eq!(json["mode"], "editing");
    assert_eq!(json["current"]["fullName"], "");
    assert_eq!(json["isDirty"], false);
}
