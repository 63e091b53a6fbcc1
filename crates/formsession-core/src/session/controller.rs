use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::watch;

use super::auto_save::AutoSaveTimer;
use super::collaborator::{RecordSaver, RecordSource};
use super::model::{
    Mode, RefreshOutcome, ReseedOutcome, SaveOutcome, SessionSnapshot, Status, StatusMessage,
};
use crate::config::FormSessionConfig;
use crate::error::FormSessionError;
use crate::record::{FieldMap, Mergeable};
use crate::validation::{AcceptAll, FieldErrors, Validator};

/// Mutable session state. Guarded by a mutex that is never held across an
/// `.await`.
struct SessionState<R> {
    current: R,
    original: R,
    mode: Mode,
    errors: FieldErrors,
    status: Status,
    message: Option<StatusMessage>,
    /// Initial data that arrived while unsaved edits were open.
    pending_reseed: Option<R>,
}

impl<R: Clone + PartialEq> SessionState<R> {
    fn is_dirty(&self) -> bool {
        self.current != self.original
    }

    fn clear_feedback(&mut self) {
        self.errors.clear();
        self.message = None;
    }

    /// Replaces both snapshots with `data`.
    fn reseed_with(&mut self, data: R) {
        self.current = data.clone();
        self.original = data;
        self.pending_reseed = None;
    }

    fn snapshot(&self) -> SessionSnapshot<R> {
        SessionSnapshot {
            current: self.current.clone(),
            original: self.original.clone(),
            mode: self.mode,
            errors: self.errors.clone(),
            status: self.status,
            message: self.message.clone(),
            is_dirty: self.is_dirty(),
            has_pending_reseed: self.pending_reseed.is_some(),
        }
    }
}

struct Inner<R: Send + Sync> {
    state: Mutex<SessionState<R>>,
    saver: Arc<dyn RecordSaver<R>>,
    source: Option<Arc<dyn RecordSource<R>>>,
    validator: Arc<dyn Validator<R>>,
    config: FormSessionConfig,
    auto_save: AutoSaveTimer,
    disposed: AtomicBool,
    changes: watch::Sender<SessionSnapshot<R>>,
}

impl<R: Send + Sync> Drop for Inner<R> {
    fn drop(&mut self) {
        self.auto_save.cancel();
    }
}

/// Resets `status` to idle if an in-flight save/refresh future is dropped
/// before it completes.
struct InFlight<'a, R: Clone + PartialEq + Send + Sync + 'static> {
    session: &'a FormSession<R>,
    armed: bool,
}

impl<R: Clone + PartialEq + Send + Sync + 'static> Drop for InFlight<'_, R> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.session.lock();
            state.status = Status::Idle;
            self.session.publish(&state);
        }
    }
}

/// Controller for one editable record.
///
/// `FormSession` owns the view/edit life-cycle of a record: the committed
/// baseline (`original`), the working copy (`current`), validation errors,
/// the in-flight operation, and a top-level status message. Dirtiness is
/// derived by comparing `current` against `original`.
///
/// The handle is cheap to clone; clones share the same session. Dropping the
/// last handle (or calling [`FormSession::dispose`]) cancels any pending
/// auto-save.
///
/// # Example
///
/// ```ignore
/// let session = FormSession::builder(profile, Arc::new(api))
///     .validator(rules)
///     .build();
/// session.start_editing();
/// session.update_field(FieldMap::new().with("fullName", "Ada"));
/// if session.save().await.is_saved() { /* back in viewing mode */ }
/// ```
pub struct FormSession<R: Send + Sync> {
    inner: Arc<Inner<R>>,
}

impl<R: Send + Sync> Clone for FormSession<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Builder for [`FormSession`].
pub struct FormSessionBuilder<R: Send + Sync> {
    initial: R,
    saver: Arc<dyn RecordSaver<R>>,
    source: Option<Arc<dyn RecordSource<R>>>,
    validator: Arc<dyn Validator<R>>,
    config: FormSessionConfig,
}

impl<R: Clone + PartialEq + Send + Sync + 'static> FormSessionBuilder<R> {
    /// Optional collaborator used by [`FormSession::refresh`].
    pub fn source(mut self, source: Arc<dyn RecordSource<R>>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn validator(mut self, validator: impl Validator<R> + 'static) -> Self {
        self.validator = Arc::new(validator);
        self
    }

    pub fn config(mut self, config: FormSessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> FormSession<R> {
        let state = SessionState {
            current: self.initial.clone(),
            original: self.initial,
            mode: self.config.initial_mode,
            errors: FieldErrors::new(),
            status: Status::Idle,
            message: None,
            pending_reseed: None,
        };
        let (changes, _) = watch::channel(state.snapshot());

        tracing::debug!(
            "Creating form session (mode: {:?}, auto-save: {:?})",
            self.config.initial_mode,
            self.config.auto_save_delay()
        );

        FormSession {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                saver: self.saver,
                source: self.source,
                validator: self.validator,
                auto_save: AutoSaveTimer::new(self.config.auto_save_delay()),
                config: self.config,
                disposed: AtomicBool::new(false),
                changes,
            }),
        }
    }
}

impl<R: Clone + PartialEq + Send + Sync + 'static> FormSession<R> {
    /// Starts building a session over `initial`, persisted through `saver`.
    ///
    /// Defaults: no refresh source, every record valid, default config.
    pub fn builder(initial: R, saver: Arc<dyn RecordSaver<R>>) -> FormSessionBuilder<R> {
        FormSessionBuilder {
            initial,
            saver,
            source: None,
            validator: Arc::new(AcceptAll),
            config: FormSessionConfig::default(),
        }
    }

    // ============================================================================
    // State accessors
    // ============================================================================

    pub fn snapshot(&self) -> SessionSnapshot<R> {
        self.lock().snapshot()
    }

    /// Receiver that observes a fresh snapshot after every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot<R>> {
        self.inner.changes.subscribe()
    }

    pub fn current(&self) -> R {
        self.lock().current.clone()
    }

    pub fn original(&self) -> R {
        self.lock().original.clone()
    }

    pub fn mode(&self) -> Mode {
        self.lock().mode
    }

    pub fn status(&self) -> Status {
        self.lock().status
    }

    pub fn errors(&self) -> FieldErrors {
        self.lock().errors.clone()
    }

    pub fn message(&self) -> Option<StatusMessage> {
        self.lock().message.clone()
    }

    pub fn is_dirty(&self) -> bool {
        self.lock().is_dirty()
    }

    pub fn is_editing(&self) -> bool {
        self.mode() == Mode::Editing
    }

    pub fn is_saving(&self) -> bool {
        self.status() == Status::Saving
    }

    pub fn is_refreshing(&self) -> bool {
        self.status() == Status::Refreshing
    }

    pub fn has_pending_reseed(&self) -> bool {
        self.lock().pending_reseed.is_some()
    }

    /// True while an auto-save countdown is running.
    pub fn has_pending_auto_save(&self) -> bool {
        self.inner.auto_save.is_pending()
    }

    pub fn config(&self) -> &FormSessionConfig {
        &self.inner.config
    }

    // ============================================================================
    // Editing
    // ============================================================================

    /// Enters editing mode and clears errors and any message.
    ///
    /// Returns false if the session was already editing.
    pub fn start_editing(&self) -> bool {
        let mut state = self.lock();
        if state.mode == Mode::Editing {
            return false;
        }
        state.mode = Mode::Editing;
        state.clear_feedback();
        self.publish(&state);
        true
    }

    /// Merges a partial record into the working copy.
    ///
    /// See [`FormSession::update_with`] for the rules that apply.
    pub fn update_field(&self, patch: R::Patch) -> bool
    where
        R: Mergeable,
    {
        self.update_with(move |current| current.merge(patch))
    }

    /// Replaces the working copy with `transform(current)`.
    ///
    /// Only applies in editing mode; returns false otherwise. A success
    /// message is cleared. While errors are displayed the validator re-runs,
    /// so errors disappear as soon as the user fixes them. With auto-save
    /// configured, a dirty result (re)starts the countdown.
    pub fn update_with<F>(&self, transform: F) -> bool
    where
        F: FnOnce(&R) -> R,
    {
        let base = {
            let state = self.lock();
            if state.mode != Mode::Editing {
                tracing::debug!("Ignoring field update outside editing mode");
                return false;
            }
            state.current.clone()
        };
        // Run the caller's transform without holding the lock.
        let next = transform(&base);

        let (dirty, saving) = {
            let mut state = self.lock();
            if state.mode != Mode::Editing {
                return false;
            }
            state.current = next;
            if state.message.as_ref().is_some_and(StatusMessage::is_success) {
                state.message = None;
            }
            if !state.errors.is_empty() {
                state.errors = self.inner.validator.validate(&state.current);
            }
            self.publish(&state);
            (state.is_dirty(), state.status == Status::Saving)
        };

        if dirty && !saving {
            self.schedule_auto_save();
        } else if !dirty {
            // Back at the baseline; nothing left to save.
            self.inner.auto_save.cancel();
        }
        true
    }

    /// Sets an error on one field, e.g. a server-side per-field rejection.
    pub fn set_field_error(&self, field: impl Into<String>, text: impl Into<String>) {
        let mut state = self.lock();
        state.errors.insert(field.into(), text.into());
        self.publish(&state);
    }

    /// Removes the error on `field`. Returns true if there was one.
    pub fn clear_field_error(&self, field: &str) -> bool {
        let mut state = self.lock();
        let removed = state.errors.remove(field).is_some();
        if removed {
            self.publish(&state);
        }
        removed
    }

    /// Clears the top-level message.
    pub fn dismiss_message(&self) {
        let mut state = self.lock();
        if state.message.take().is_some() {
            self.publish(&state);
        }
    }

    // ============================================================================
    // Save / cancel / reset / refresh
    // ============================================================================

    /// Validates and saves the working copy.
    ///
    /// Validation runs first; when it fails the saver is not called. While a
    /// save or refresh is already running the call is skipped. On success the
    /// saved data becomes the new baseline and the session returns to viewing
    /// mode, unless the record was edited while the save was in flight: then
    /// it stays in editing mode and auto-save (if configured) is rescheduled.
    /// On failure the edits are kept and the reason is shown.
    pub async fn save(&self) -> SaveOutcome {
        if self.inner.auto_save.cancel() {
            tracing::trace!("Immediate save replaced pending auto-save");
        }
        self.run_save().await
    }

    async fn run_save(&self) -> SaveOutcome {
        let data = {
            let mut state = self.lock();
            if state.status != Status::Idle {
                tracing::debug!("Save skipped, {:?} already in flight", state.status);
                return SaveOutcome::Skipped;
            }

            let errors = self.inner.validator.validate(&state.current);
            if !errors.is_empty() {
                tracing::debug!("Save blocked by {} validation error(s)", errors.len());
                state.errors = errors.clone();
                state.message = Some(StatusMessage::error(&self.inner.config.validation_message));
                self.publish(&state);
                return SaveOutcome::Invalid(errors);
            }

            state.status = Status::Saving;
            self.publish(&state);
            state.current.clone()
        };

        let mut in_flight = InFlight {
            session: self,
            armed: true,
        };
        let result = self.inner.saver.save(&data).await;
        in_flight.armed = false;

        let (outcome, edited_during_save) = {
            let mut state = self.lock();
            state.status = Status::Idle;
            let mut edited_during_save = false;
            let outcome = match result {
                Ok(()) => {
                    if state.pending_reseed.take().is_some() {
                        tracing::warn!("Discarding deferred reseed; saved data supersedes it");
                    }
                    // Edits made while the save was in flight stay open.
                    edited_during_save = state.current != data;
                    state.original = data;
                    state.errors.clear();
                    if !edited_during_save {
                        state.mode = Mode::Viewing;
                    }
                    state.message =
                        Some(StatusMessage::success(&self.inner.config.success_message));
                    tracing::info!("Form session saved");
                    SaveOutcome::Saved
                }
                Err(e) => {
                    let err = FormSessionError::operation("save", e.to_string());
                    tracing::warn!("Form session save failed: {}", e);
                    state.message = Some(StatusMessage::error(err.display_text()));
                    SaveOutcome::Failed(err)
                }
            };
            self.publish(&state);
            (outcome, edited_during_save)
        };

        if edited_during_save {
            tracing::debug!("Record changed during save, staying in editing mode");
            self.schedule_auto_save();
        }
        outcome
    }

    /// Discards edits and leaves editing mode.
    ///
    /// Initial data deferred by [`FormSession::reseed`] is applied here.
    /// Returns false if the session was not editing.
    pub fn cancel(&self) -> bool {
        self.inner.auto_save.cancel();
        let mut state = self.lock();
        if state.mode != Mode::Editing {
            return false;
        }
        state.current = state.original.clone();
        if let Some(pending) = state.pending_reseed.take() {
            tracing::debug!("Applying deferred reseed after cancel");
            state.reseed_with(pending);
        }
        state.clear_feedback();
        state.mode = Mode::Viewing;
        self.publish(&state);
        true
    }

    /// Restores the working copy to the baseline without leaving the current
    /// mode. No collaborator is called.
    pub fn reset(&self) {
        self.inner.auto_save.cancel();
        let mut state = self.lock();
        state.current = state.original.clone();
        state.clear_feedback();
        self.publish(&state);
    }

    /// Re-fetches the record and replaces both snapshots with it.
    ///
    /// Unsaved edits are discarded on success; warning the user beforehand is
    /// up to the caller. Without a refresh source this is a no-op.
    pub async fn refresh(&self) -> RefreshOutcome {
        let Some(source) = self.inner.source.clone() else {
            tracing::debug!("Refresh requested but no refresh source is configured");
            return RefreshOutcome::Unavailable;
        };

        {
            let mut state = self.lock();
            if state.status != Status::Idle {
                tracing::debug!("Refresh skipped, {:?} already in flight", state.status);
                return RefreshOutcome::Skipped;
            }
            state.status = Status::Refreshing;
            self.publish(&state);
        }

        let mut in_flight = InFlight {
            session: self,
            armed: true,
        };
        let result = source.fetch().await;
        in_flight.armed = false;

        let mut state = self.lock();
        state.status = Status::Idle;
        let outcome = match result {
            Ok(fresh) => {
                self.inner.auto_save.cancel();
                state.reseed_with(fresh);
                state.clear_feedback();
                tracing::info!("Form session refreshed");
                RefreshOutcome::Refreshed
            }
            Err(e) => {
                let err = FormSessionError::operation("refresh", e.to_string());
                tracing::warn!("Form session refresh failed: {}", e);
                state.message = Some(StatusMessage::error(err.display_text()));
                RefreshOutcome::Failed(err)
            }
        };
        self.publish(&state);
        outcome
    }

    // ============================================================================
    // Lifecycle
    // ============================================================================

    /// Supplies new initial data, e.g. after the owner re-fetched the record.
    ///
    /// While the user has unsaved edits the data is held back instead of
    /// overwriting them: it is applied on [`FormSession::cancel`] and dropped
    /// on a successful save. Use [`FormSession::force_reseed`] to overwrite
    /// anyway.
    pub fn reseed(&self, initial: R) -> ReseedOutcome {
        let mut state = self.lock();
        if initial == state.original {
            // A deferred reseed is stale once the source is back at the baseline.
            if state.pending_reseed.take().is_some() {
                tracing::debug!("Dropping deferred reseed; initial data matches baseline again");
                self.publish(&state);
            }
            return ReseedOutcome::Unchanged;
        }
        if state.mode == Mode::Editing && state.is_dirty() {
            tracing::warn!("New initial data arrived during unsaved edits; deferring reseed");
            state.pending_reseed = Some(initial);
            self.publish(&state);
            return ReseedOutcome::Deferred;
        }
        state.reseed_with(initial);
        self.publish(&state);
        ReseedOutcome::Applied
    }

    /// Replaces both snapshots with `initial`, discarding unsaved edits.
    pub fn force_reseed(&self, initial: R) {
        self.inner.auto_save.cancel();
        let mut state = self.lock();
        state.reseed_with(initial);
        self.publish(&state);
    }

    /// Cancels any pending auto-save and stops scheduling new ones.
    ///
    /// Call when the owning view goes away while other handles may still be
    /// alive.
    pub fn dispose(&self) {
        self.inner.disposed.store(true, Ordering::SeqCst);
        if self.inner.auto_save.cancel() {
            tracing::debug!("Pending auto-save cancelled on dispose");
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    // ============================================================================
    // Internals
    // ============================================================================

    fn lock(&self) -> MutexGuard<'_, SessionState<R>> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &SessionState<R>) {
        self.inner.changes.send_replace(state.snapshot());
    }

    fn schedule_auto_save(&self) {
        if !self.inner.auto_save.is_enabled() || self.is_disposed() {
            return;
        }
        let weak: Weak<Inner<R>> = Arc::downgrade(&self.inner);
        self.inner.auto_save.schedule(move || async move {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let session = FormSession { inner };
            if session.is_disposed() {
                return;
            }
            {
                let state = session.lock();
                if state.mode != Mode::Editing || !state.is_dirty() {
                    return;
                }
            }
            session.run_save().await;
        });
    }
}

impl FormSession<FieldMap> {
    /// Names of fields whose working value differs from the baseline.
    pub fn dirty_fields(&self) -> Vec<String> {
        let state = self.lock();
        state.current.changed_fields(&state.original)
    }
}
