//! Submission controller: submit-note, add-response and delete flows.
//!
//! # Responsibility
//! - Own the compose draft and per-note response drafts.
//! - Run each write under a watchdog and translate the result into draft
//!   updates and a notification.
//!
//! # Invariants
//! - A key is pending from the moment validation passes until its outcome is
//!   decided; a second trigger for that key is ignored meanwhile.
//! - Store writes run as detached tasks. The watchdog only releases local
//!   state, the write keeps going and later shows up through the
//!   subscription.
//! - Drafts are kept on store failure so the user can retry without retyping.
//! - A reply is only added to a note that has none; replacing one is left to
//!   direct store access.

use crate::config::BoardConfig;
use crate::controller::notifier::{ErrorClass, Notification, Notifier};
use crate::controller::{
    BoardError, DeleteConfirmation, OperationKey, OperationOutcome, OperationState, ResponseLookup,
};
use crate::model::note::{normalize_response, NewNote, NoteId, Role, ValidationError};
use crate::store::{NoteStore, StoreError, StoreResult};
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

pub const MSG_EMPTY_MESSAGE: &str = "Please write a message";
pub const MSG_SUBMITTED: &str = "✅ Appreciation submitted! Thank you!";
pub const MSG_SUBMIT_FAILED: &str = "❌ Failed to submit. Please try again.";
pub const MSG_SUBMIT_TIMEOUT: &str = "Submission took too long. Please try again.";
pub const MSG_EMPTY_RESPONSE: &str = "Please write a response";
pub const MSG_RESPONSE_EXISTS: &str = "This appreciation already has a response";
pub const MSG_RESPONSE_SAVED: &str = "Response saved";
pub const MSG_RESPONSE_FAILED: &str = "Failed to add response. Please try again.";
pub const MSG_RESPONSE_TIMEOUT: &str = "Saving the response took too long. Please try again.";
pub const MSG_DELETED: &str = "Appreciation deleted";
pub const MSG_DELETE_FAILED: &str = "Failed to delete";
pub const MSG_DELETE_TIMEOUT: &str = "Delete took too long. Please try again.";

/// The compose form's input state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeDraft {
    pub role: Role,
    pub message: String,
}

impl Default for ComposeDraft {
    fn default() -> Self {
        Self {
            role: Role::Student,
            message: String::new(),
        }
    }
}

#[derive(Default)]
struct ControllerState {
    pending: HashSet<OperationKey>,
    compose: ComposeDraft,
    response_drafts: HashMap<NoteId, String>,
    scroll_hint: bool,
}

/// Releases a pending key when the operation finishes or is dropped.
struct PendingGuard<'a> {
    state: &'a Mutex<ControllerState>,
    key: OperationKey,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.pending.remove(&self.key);
    }
}

/// Mediates every user-initiated write.
pub struct SubmissionController {
    store: Arc<dyn NoteStore>,
    responses: Arc<dyn ResponseLookup>,
    notifier: Notifier,
    watchdog_timeout: Duration,
    state: Mutex<ControllerState>,
}

impl SubmissionController {
    pub fn new(
        store: Arc<dyn NoteStore>,
        responses: Arc<dyn ResponseLookup>,
        notifier: Notifier,
        config: &BoardConfig,
    ) -> Self {
        Self {
            store,
            responses,
            notifier,
            watchdog_timeout: config.watchdog_timeout(),
            state: Mutex::new(ControllerState::default()),
        }
    }

    /// Validates and sends a new note.
    ///
    /// The compose draft is replaced by `(role, message)` first, so a failed
    /// write leaves it ready for retry.
    pub async fn submit_note(&self, role: Role, message: &str) -> OperationOutcome<NoteId> {
        let key = OperationKey::SubmitNote;
        let begin = self.begin(&key, |state| {
            state.compose = ComposeDraft {
                role,
                message: message.to_string(),
            };
            NewNote::new(role, message)
        });
        let (draft, _pending) = match begin {
            Begin::Started(draft, guard) => (draft, guard),
            Begin::Ignored => return OperationOutcome::Ignored,
            Begin::Rejected(err) => {
                self.notifier.error(MSG_EMPTY_MESSAGE, ErrorClass::Validation);
                return OperationOutcome::Rejected(err);
            }
        };

        info!(
            "event=note_submit module=controller status=start role={} message_len={}",
            draft.role(),
            draft.message().chars().count()
        );
        let store = Arc::clone(&self.store);
        let result = self
            .run_with_watchdog(&key, async move { store.create(&draft).await })
            .await;

        match result {
            Ok(id) => {
                {
                    let mut state = self.lock_state();
                    state.compose.message.clear();
                    state.scroll_hint = true;
                }
                info!(
                    "event=note_submit module=controller status=ok note_id={}",
                    id
                );
                self.notifier.success(MSG_SUBMITTED);
                OperationOutcome::Succeeded(id)
            }
            Err(err @ BoardError::Timeout { .. }) => {
                self.lock_state().compose.message.clear();
                self.notifier.error(MSG_SUBMIT_TIMEOUT, ErrorClass::Timeout);
                OperationOutcome::Failed(err)
            }
            Err(err) => {
                self.notifier.error(MSG_SUBMIT_FAILED, (&err).into());
                OperationOutcome::Failed(err)
            }
        }
    }

    /// Validates and saves the first reply on one note.
    ///
    /// A note that already shows a reply is rejected with
    /// `ValidationError::ResponseExists` and nothing is sent.
    pub async fn add_response(&self, id: &NoteId, text: &str) -> OperationOutcome {
        let key = OperationKey::AddResponse(id.clone());
        let begin = self.begin(&key, |state| {
            if self.responses.has_response(id) {
                state.response_drafts.remove(id);
                return Err(ValidationError::ResponseExists(id.clone()));
            }
            state.response_drafts.insert(id.clone(), text.to_string());
            normalize_response(text)
        });
        let (response, _pending) = match begin {
            Begin::Started(response, guard) => (response, guard),
            Begin::Ignored => return OperationOutcome::Ignored,
            Begin::Rejected(err) => {
                let message = match err {
                    ValidationError::ResponseExists(_) => MSG_RESPONSE_EXISTS,
                    _ => MSG_EMPTY_RESPONSE,
                };
                self.notifier.error(message, ErrorClass::Validation);
                return OperationOutcome::Rejected(err);
            }
        };

        info!(
            "event=response_add module=controller status=start note_id={} response_len={}",
            id,
            response.chars().count()
        );
        let store = Arc::clone(&self.store);
        let target = id.clone();
        let result = self
            .run_with_watchdog(&key, async move {
                store.set_response(&target, &response).await
            })
            .await;

        match result {
            Ok(()) => {
                self.lock_state().response_drafts.remove(id);
                info!(
                    "event=response_add module=controller status=ok note_id={}",
                    id
                );
                self.notifier.success(MSG_RESPONSE_SAVED);
                OperationOutcome::Succeeded(())
            }
            Err(err @ BoardError::Timeout { .. }) => {
                self.notifier.error(MSG_RESPONSE_TIMEOUT, ErrorClass::Timeout);
                OperationOutcome::Failed(err)
            }
            Err(err) => {
                self.notifier.error(MSG_RESPONSE_FAILED, (&err).into());
                OperationOutcome::Failed(err)
            }
        }
    }

    /// Deletes one note after `confirmation` approves it.
    pub async fn delete_note<C>(&self, id: &NoteId, confirmation: C) -> OperationOutcome
    where
        C: DeleteConfirmation,
    {
        let key = OperationKey::Delete(id.clone());
        if self.is_pending(&key) {
            debug!(
                "event=note_delete module=controller status=ignored note_id={}",
                id
            );
            return OperationOutcome::Ignored;
        }
        if !confirmation.confirm_delete(id) {
            info!(
                "event=note_delete module=controller status=declined note_id={}",
                id
            );
            return OperationOutcome::Declined;
        }
        let _pending = match self.begin(&key, |_| Ok::<(), std::convert::Infallible>(())) {
            Begin::Started((), guard) => guard,
            Begin::Ignored => return OperationOutcome::Ignored,
            Begin::Rejected(never) => match never {},
        };

        info!(
            "event=note_delete module=controller status=start note_id={}",
            id
        );
        let store = Arc::clone(&self.store);
        let target = id.clone();
        let result = self
            .run_with_watchdog(&key, async move { store.remove(&target).await })
            .await;

        match result {
            Ok(()) => {
                self.lock_state().response_drafts.remove(id);
                info!(
                    "event=note_delete module=controller status=ok note_id={}",
                    id
                );
                self.notifier.success(MSG_DELETED);
                OperationOutcome::Succeeded(())
            }
            Err(err @ BoardError::Timeout { .. }) => {
                self.notifier.error(MSG_DELETE_TIMEOUT, ErrorClass::Timeout);
                OperationOutcome::Failed(err)
            }
            Err(err) => {
                self.notifier.error(MSG_DELETE_FAILED, (&err).into());
                OperationOutcome::Failed(err)
            }
        }
    }

    pub fn pending_state(&self, key: &OperationKey) -> OperationState {
        if self.is_pending(key) {
            OperationState::Pending
        } else {
            OperationState::Idle
        }
    }

    pub fn is_pending(&self, key: &OperationKey) -> bool {
        self.lock_state().pending.contains(key)
    }

    pub fn last_notification(&self) -> Option<Notification> {
        self.notifier.current()
    }

    pub fn compose_draft(&self) -> ComposeDraft {
        self.lock_state().compose.clone()
    }

    /// Edits the compose form. Ignored while a submission is pending.
    pub fn set_compose_draft(&self, role: Role, message: &str) {
        let mut state = self.lock_state();
        if state.pending.contains(&OperationKey::SubmitNote) {
            return;
        }
        state.compose = ComposeDraft {
            role,
            message: message.to_string(),
        };
    }

    pub fn response_draft(&self, id: &NoteId) -> Option<String> {
        self.lock_state().response_drafts.get(id).cloned()
    }

    /// Abandons an in-progress reply without sending it.
    pub fn cancel_response(&self, id: &NoteId) {
        self.lock_state().response_drafts.remove(id);
    }

    /// Returns `true` once after each successful submission.
    pub fn take_scroll_hint(&self) -> bool {
        std::mem::take(&mut self.lock_state().scroll_hint)
    }

    fn lock_state(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Leaves Idle for `key`: runs `prepare` and marks the key pending when it
    /// succeeds, all under one lock.
    fn begin<T, E>(
        &self,
        key: &OperationKey,
        prepare: impl FnOnce(&mut ControllerState) -> Result<T, E>,
    ) -> Begin<'_, T, E> {
        let mut state = self.lock_state();
        if state.pending.contains(key) {
            debug!(
                "event=operation_trigger module=controller status=ignored kind={}",
                key.kind()
            );
            return Begin::Ignored;
        }
        match prepare(&mut state) {
            Ok(value) => {
                state.pending.insert(key.clone());
                Begin::Started(
                    value,
                    PendingGuard {
                        state: &self.state,
                        key: key.clone(),
                    },
                )
            }
            Err(err) => {
                info!(
                    "event=operation_trigger module=controller status=rejected kind={}",
                    key.kind()
                );
                Begin::Rejected(err)
            }
        }
    }

    async fn run_with_watchdog<T, F>(&self, key: &OperationKey, write: F) -> Result<T, BoardError>
    where
        T: Send + 'static,
        F: Future<Output = StoreResult<T>> + Send + 'static,
    {
        let started_at = Instant::now();
        let kind = key.kind();
        let handle = tokio::spawn(write);

        match tokio::time::timeout(self.watchdog_timeout, handle).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(err))) => {
                warn!(
                    "event=operation_write module=controller status=error kind={} duration_ms={} error={}",
                    kind,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(BoardError::Store(err))
            }
            Ok(Err(join_err)) => {
                warn!(
                    "event=operation_write module=controller status=error kind={} error_code=task_failed error={}",
                    kind, join_err
                );
                Err(BoardError::Store(StoreError::Unavailable(format!(
                    "write task failed: {join_err}"
                ))))
            }
            Err(_) => {
                warn!(
                    "event=operation_write module=controller status=timeout kind={} timeout_ms={}",
                    kind,
                    self.watchdog_timeout.as_millis()
                );
                Err(BoardError::Timeout {
                    after: self.watchdog_timeout,
                })
            }
        }
    }
}

enum Begin<'a, T, E> {
    Started(T, PendingGuard<'a>),
    Ignored,
    Rejected(E),
}

#[cfg(test)]
mod tests {
    use super::{ComposeDraft, SubmissionController, MSG_RESPONSE_EXISTS};
    use crate::config::BoardConfig;
    use crate::controller::notifier::{ErrorClass, Notifier};
    use crate::controller::{OperationKey, OperationOutcome, OperationState, ResponseLookup};
    use crate::model::note::{NoteId, Role, ValidationError};
    use crate::store::memory::InMemoryNoteStore;
    use std::sync::Arc;

    struct Answered(Vec<NoteId>);

    impl ResponseLookup for Answered {
        fn has_response(&self, id: &NoteId) -> bool {
            self.0.contains(id)
        }
    }

    fn controller_over(store: &InMemoryNoteStore, answered: Vec<NoteId>) -> SubmissionController {
        let config = BoardConfig::default();
        SubmissionController::new(
            Arc::new(store.clone()),
            Arc::new(Answered(answered)),
            Notifier::new(config.notification_ttl()),
            &config,
        )
    }

    fn controller() -> SubmissionController {
        controller_over(&InMemoryNoteStore::new(), Vec::new())
    }

    #[tokio::test]
    async fn answered_note_is_rejected_before_reaching_the_store() {
        let store = InMemoryNoteStore::new();
        let id = NoteId::new("answered");
        let controller = controller_over(&store, vec![id.clone()]);

        let outcome = controller.add_response(&id, "another reply").await;
        assert!(matches!(
            outcome,
            OperationOutcome::Rejected(ValidationError::ResponseExists(ref rejected)) if rejected == &id
        ));
        assert_eq!(store.call_counts().set_response, 0);
        assert_eq!(controller.response_draft(&id), None);

        let shown = controller.last_notification().unwrap();
        assert_eq!(shown.message, MSG_RESPONSE_EXISTS);
        assert_eq!(shown.error, Some(ErrorClass::Validation));
        assert_eq!(
            controller.pending_state(&OperationKey::AddResponse(id)),
            OperationState::Idle
        );
    }

    #[test]
    fn compose_draft_defaults_to_student_with_empty_message() {
        let controller = controller();
        assert_eq!(controller.compose_draft(), ComposeDraft::default());
        assert_eq!(controller.compose_draft().role, Role::Student);
        assert_eq!(
            controller.pending_state(&OperationKey::SubmitNote),
            OperationState::Idle
        );
    }

    #[test]
    fn scroll_hint_is_not_raised_without_a_submission() {
        let controller = controller();
        assert!(!controller.take_scroll_hint());
    }

    #[test]
    fn set_compose_draft_updates_role_and_message() {
        let controller = controller();
        controller.set_compose_draft(Role::Admin, "draft");
        assert_eq!(
            controller.compose_draft(),
            ComposeDraft {
                role: Role::Admin,
                message: "draft".to_string()
            }
        );
    }
}
