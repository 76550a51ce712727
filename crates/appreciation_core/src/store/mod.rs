//! Record store adapter contract and implementations.
//!
//! # Responsibility
//! - Define the only seam between board logic and the backing real-time store.
//! - Hide the transport: callers see "the whole ordered collection whenever it
//!   changes", nothing more.
//!
//! # Invariants
//! - Ids and `created_at` are assigned by the store, never by callers.
//! - Every successful mutation publishes exactly one full snapshot to every
//!   live subscriber, in mutation order.
//! - A new subscriber receives the current snapshot before `subscribe` returns.
//! - A failure delivered through `on_error` ends that subscription; there is
//!   no automatic retry.

use crate::model::note::{NewNote, NoteId, Snapshot};
use async_trait::async_trait;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

mod hub;
pub mod memory;
pub mod sqlite;

pub use hub::Subscription;
pub(crate) use hub::SubscriberHub;

pub type StoreResult<T> = Result<T, StoreError>;

/// Receives every full snapshot, starting with the current one.
pub type ChangeCallback = Box<dyn Fn(&Snapshot) + Send + Sync>;
/// Receives a subscription failure. Called at most once per subscription.
pub type ErrorCallback = Box<dyn Fn(&StoreError) + Send + Sync>;

/// Adapter-originated failure.
#[derive(Debug)]
pub enum StoreError {
    /// Transient backend or transport failure.
    Unavailable(String),
    /// Target record vanished before the write landed.
    NotFound(NoteId),
    /// SQLite failure (SQLite adapter only).
    Sqlite(rusqlite::Error),
    /// The database file was written by a newer build.
    SchemaTooNew { found: u32, supported: u32 },
    /// The `notes` table does not have the columns this build reads.
    SchemaMismatch(String),
    /// A persisted row violates the note model.
    CorruptRecord(String),
}

impl StoreError {
    /// Returns whether this error means "backend could not be reached".
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Sqlite(_))
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(reason) => write!(f, "store unavailable: {reason}"),
            Self::NotFound(id) => write!(f, "note not found: {id}"),
            Self::Sqlite(err) => write!(f, "store database error: {err}"),
            Self::SchemaTooNew { found, supported } => write!(
                f,
                "database schema version {found} is newer than supported {supported}"
            ),
            Self::SchemaMismatch(detail) => write!(f, "unexpected notes schema: {detail}"),
            Self::CorruptRecord(detail) => write!(f, "invalid persisted note: {detail}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// Adapter over a single collection of note records.
#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Persists a new note with no response and returns its store-assigned id.
    async fn create(&self, draft: &NewNote) -> StoreResult<NoteId>;

    /// Overwrites the `response` field of one existing note.
    async fn set_response(&self, id: &NoteId, text: &str) -> StoreResult<()>;

    /// Deletes one note.
    async fn remove(&self, id: &NoteId) -> StoreResult<()>;

    /// Registers a standing live query over the full collection, newest first.
    ///
    /// Callbacks run on the writer's path and must not call back into the
    /// store.
    fn subscribe(&self, on_change: ChangeCallback, on_error: ErrorCallback) -> Subscription;
}

/// Next store timestamp: wall clock, bumped so values strictly increase.
pub(crate) fn next_created_at(last: i64) -> i64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0);
    now.max(last + 1)
}

pub(crate) fn generate_note_id() -> NoteId {
    NoteId::new(uuid::Uuid::new_v4().simple().to_string())
}

#[cfg(test)]
mod tests {
    use super::{next_created_at, StoreError};
    use crate::model::note::NoteId;

    #[test]
    fn created_at_is_strictly_increasing_even_with_future_last_value() {
        let far_future = i64::MAX / 2;
        assert_eq!(next_created_at(far_future), far_future + 1);
        let first = next_created_at(0);
        assert!(next_created_at(first) > first);
    }

    #[test]
    fn unavailable_classification_excludes_not_found() {
        assert!(StoreError::Unavailable("offline".to_string()).is_unavailable());
        assert!(!StoreError::NotFound(NoteId::new("x")).is_unavailable());
    }
}
