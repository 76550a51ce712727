//! User-initiated writes and their feedback.
//!
//! # Responsibility
//! - Validate input, send writes through the store adapter and report the
//!   result through the shared notification slot.
//! - Track per-operation pending state so repeated triggers cannot duplicate
//!   writes.
//!
//! # Invariants
//! - Validation failures never reach the store.
//! - Each operation key has at most one pending write.
//! - No pending state outlives the watchdog timeout.

use crate::model::note::{NoteId, ValidationError};
use crate::store::StoreError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

pub mod notifier;
pub mod submission;

/// Identifies one trigger affordance: the compose form or a per-note button.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OperationKey {
    SubmitNote,
    AddResponse(NoteId),
    Delete(NoteId),
}

impl OperationKey {
    pub fn kind(&self) -> &'static str {
        match self {
            OperationKey::SubmitNote => "submit_note",
            OperationKey::AddResponse(_) => "add_response",
            OperationKey::Delete(_) => "delete",
        }
    }
}

/// Trigger state observed by presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    Idle,
    /// The trigger is disabled until the write resolves or the watchdog fires.
    Pending,
}

/// Failure of a write after it left the client.
#[derive(Debug)]
pub enum BoardError {
    Store(StoreError),
    /// The watchdog fired first. The write itself may still land later.
    Timeout { after: Duration },
}

impl Display for BoardError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
            Self::Timeout { after } => {
                write!(f, "write did not resolve within {} ms", after.as_millis())
            }
        }
    }
}

impl Error for BoardError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::Timeout { .. } => None,
        }
    }
}

impl From<StoreError> for BoardError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Result of one trigger.
#[derive(Debug)]
pub enum OperationOutcome<T = ()> {
    Succeeded(T),
    Failed(BoardError),
    /// Client-side validation failed; nothing was sent.
    Rejected(ValidationError),
    /// The same operation was already pending.
    Ignored,
    /// The user declined the confirmation step.
    Declined,
}

impl<T> OperationOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }

    pub fn error(&self) -> Option<&BoardError> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// What the presentation currently shows about one note's reply.
pub trait ResponseLookup: Send + Sync {
    /// `true` when the note is known and already has a reply.
    fn has_response(&self, id: &NoteId) -> bool;
}

/// Explicit confirmation step required before a delete.
pub trait DeleteConfirmation {
    fn confirm_delete(&self, id: &NoteId) -> bool;
}

impl<F> DeleteConfirmation for F
where
    F: Fn(&NoteId) -> bool,
{
    fn confirm_delete(&self, id: &NoteId) -> bool {
        self(id)
    }
}
