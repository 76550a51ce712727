//! SQLite-backed note store.
//!
//! # Responsibility
//! - Persist notes in the `notes` table and stream full snapshots to
//!   subscribers after every successful write.
//!
//! # Invariants
//! - All statements run on tokio's blocking pool, never on async workers.
//! - Write, snapshot reload and publication happen under the connection lock,
//!   so subscribers see writes in commit order.
//! - Change notification covers writes made through this handle and its
//!   clones only.
//! - Rows sharing a `created_at` (two processes writing one file) are ordered
//!   newest insert first.

pub mod schema;

use crate::model::note::{NewNote, NoteId, NoteRecord, Role};
use crate::store::{
    generate_note_id, next_created_at, ChangeCallback, ErrorCallback, NoteStore, StoreError,
    StoreResult, SubscriberHub, Subscription,
};
use async_trait::async_trait;
use log::error;
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const NOTE_SELECT_SQL: &str = "SELECT
    id,
    role,
    message,
    response,
    created_at
FROM notes
ORDER BY created_at DESC, rowid DESC;";

struct SqliteInner {
    conn: Mutex<Connection>,
    hub: Arc<SubscriberHub>,
}

/// Note store persisted in SQLite. Clones share the connection.
#[derive(Clone)]
pub struct SqliteNoteStore {
    inner: Arc<SqliteInner>,
}

impl SqliteNoteStore {
    /// Opens (and migrates) a database file.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Ok(Self::from_connection(schema::open_file(path)?))
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self::from_connection(schema::open_memory()?))
    }

    /// Wraps an already migrated connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            inner: Arc::new(SqliteInner {
                conn: Mutex::new(conn),
                hub: SubscriberHub::new(),
            }),
        }
    }

    async fn run_blocking<T, F>(&self, operation: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&SqliteInner) -> StoreResult<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || operation(&inner))
            .await
            .map_err(|err| StoreError::Unavailable(format!("sqlite task failed: {err}")))?
    }
}

impl SqliteInner {
    fn lock_conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish_from(&self, conn: &Connection) -> StoreResult<()> {
        let notes = load_notes(conn)?;
        self.hub.publish(notes);
        Ok(())
    }
}

#[async_trait]
impl NoteStore for SqliteNoteStore {
    async fn create(&self, draft: &NewNote) -> StoreResult<NoteId> {
        let draft = draft.clone();
        self.run_blocking(move |inner| {
            let conn = inner.lock_conn();
            let last: i64 = conn.query_row(
                "SELECT COALESCE(MAX(created_at), 0) FROM notes;",
                [],
                |row| row.get(0),
            )?;
            let id = generate_note_id();
            conn.execute(
                "INSERT INTO notes (id, role, message, response, created_at)
                 VALUES (?1, ?2, ?3, NULL, ?4);",
                params![
                    id.as_str(),
                    draft.role().as_str(),
                    draft.message(),
                    next_created_at(last),
                ],
            )?;
            inner.publish_from(&conn)?;
            Ok(id)
        })
        .await
    }

    async fn set_response(&self, id: &NoteId, text: &str) -> StoreResult<()> {
        let id = id.clone();
        let text = text.to_string();
        self.run_blocking(move |inner| {
            let conn = inner.lock_conn();
            let changed = conn.execute(
                "UPDATE notes SET response = ?2 WHERE id = ?1;",
                params![id.as_str(), text],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(id));
            }
            inner.publish_from(&conn)
        })
        .await
    }

    async fn remove(&self, id: &NoteId) -> StoreResult<()> {
        let id = id.clone();
        self.run_blocking(move |inner| {
            let conn = inner.lock_conn();
            let changed = conn.execute("DELETE FROM notes WHERE id = ?1;", [id.as_str()])?;
            if changed == 0 {
                return Err(StoreError::NotFound(id));
            }
            inner.publish_from(&conn)
        })
        .await
    }

    fn subscribe(&self, on_change: ChangeCallback, on_error: ErrorCallback) -> Subscription {
        let conn = self.inner.lock_conn();
        match load_notes(&conn) {
            Ok(notes) => self.inner.hub.register(notes, on_change, on_error),
            Err(err) => {
                error!(
                    "event=subscribe module=store status=error backend=sqlite error={}",
                    err
                );
                on_error(&err);
                Subscription::inactive()
            }
        }
    }
}

fn load_notes(conn: &Connection) -> StoreResult<Vec<NoteRecord>> {
    let mut stmt = conn.prepare(NOTE_SELECT_SQL)?;
    let mut rows = stmt.query([])?;
    let mut notes = Vec::new();
    while let Some(row) = rows.next()? {
        notes.push(parse_note_row(row)?);
    }
    Ok(notes)
}

fn parse_note_row(row: &Row<'_>) -> StoreResult<NoteRecord> {
    let role_text: String = row.get("role")?;
    let role = role_text.parse::<Role>().map_err(|_| {
        StoreError::CorruptRecord(format!("invalid role `{role_text}` in notes.role"))
    })?;
    let id: String = row.get("id")?;

    Ok(NoteRecord {
        id: NoteId::new(id),
        role,
        message: row.get("message")?,
        response: row.get("response")?,
        created_at: row.get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::schema::open_memory;
    use super::{load_notes, SqliteNoteStore};
    use crate::model::note::Snapshot;
    use crate::store::{NoteStore, StoreError};

    #[test]
    fn invalid_role_rows_are_rejected_on_read() {
        let conn = open_memory().unwrap();
        conn.execute_batch("PRAGMA ignore_check_constraints = ON;")
            .unwrap();
        conn.execute(
            "INSERT INTO notes (id, role, message, response, created_at)
             VALUES ('x', 'Teacher', 'hi', NULL, 1);",
            [],
        )
        .unwrap();

        let err = load_notes(&conn).unwrap_err();
        assert!(matches!(err, StoreError::CorruptRecord(_)));
        assert!(err.to_string().contains("Teacher"));
    }

    #[test]
    fn tied_timestamps_list_the_later_insert_first() {
        let conn = open_memory().unwrap();
        conn.execute_batch(
            "INSERT INTO notes (id, role, message, response, created_at)
             VALUES ('zzz', 'Student', 'first writer', NULL, 42);
             INSERT INTO notes (id, role, message, response, created_at)
             VALUES ('aaa', 'Parent', 'second writer', NULL, 42);
             INSERT INTO notes (id, role, message, response, created_at)
             VALUES ('mmm', 'Admin', 'older', NULL, 41);",
        )
        .unwrap();

        let ids: Vec<String> = load_notes(&conn)
            .unwrap()
            .into_iter()
            .map(|note| note.id.as_str().to_string())
            .collect();
        assert_eq!(ids, vec!["aaa", "zzz", "mmm"]);
    }

    #[test]
    fn empty_database_subscribes_with_empty_snapshot() {
        let store = SqliteNoteStore::open_in_memory().unwrap();
        let seen = std::sync::Arc::new(std::sync::Mutex::new(None));
        let sink = std::sync::Arc::clone(&seen);
        let subscription = store.subscribe(
            Box::new(move |snapshot: &Snapshot| *sink.lock().unwrap() = Some(snapshot.notes.len())),
            Box::new(|_: &StoreError| {}),
        );
        assert!(subscription.is_active());
        assert_eq!(*seen.lock().unwrap(), Some(0));
    }
}
