//! Notes schema for the SQLite store: connection setup, versioned upgrades
//! and a shape check on the `notes` table.
//!
//! # Invariants
//! - The schema version lives in `PRAGMA user_version`; upgrades run in one
//!   transaction and never skip a step.
//! - A connection is handed out only after the `notes` table has exactly the
//!   columns the store reads, in order.

use crate::store::{StoreError, StoreResult};
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

/// Column order `notes` must have after upgrading.
pub const NOTE_COLUMNS: [&str; 5] = ["id", "role", "message", "response", "created_at"];

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// `(version, sql)` pairs; versions strictly increase.
const UPGRADES: &[(u32, &str)] = &[(1, include_str!("migrations/0001_notes.sql"))];

/// Schema version written by this build.
pub fn schema_version() -> u32 {
    UPGRADES.last().map_or(0, |(version, _)| *version)
}

/// Opens a board database file, upgrading it when needed.
pub fn open_file(path: impl AsRef<Path>) -> StoreResult<Connection> {
    connect("file", || Connection::open(path))
}

/// Opens a private in-memory board database.
pub fn open_memory() -> StoreResult<Connection> {
    connect("memory", Connection::open_in_memory)
}

fn connect(
    mode: &str,
    open: impl FnOnce() -> rusqlite::Result<Connection>,
) -> StoreResult<Connection> {
    let started_at = Instant::now();
    let prepared = open()
        .map_err(StoreError::from)
        .and_then(|mut conn| prepare(&mut conn).map(|()| conn));

    match prepared {
        Ok(conn) => {
            info!(
                "event=store_open module=store status=ok backend=sqlite mode={} schema_version={} duration_ms={}",
                mode,
                schema_version(),
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=store_open module=store status=error backend=sqlite mode={} duration_ms={} error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn prepare(conn: &mut Connection) -> StoreResult<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    upgrade(conn)?;
    check_note_columns(conn)
}

/// Brings `conn` up to [`schema_version`].
///
/// # Errors
/// - `StoreError::SchemaTooNew` when the file was written by a newer build.
pub fn upgrade(conn: &mut Connection) -> StoreResult<()> {
    let found = stored_version(conn)?;
    let supported = schema_version();
    if found > supported {
        return Err(StoreError::SchemaTooNew { found, supported });
    }
    if found == supported {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for (version, sql) in UPGRADES.iter().filter(|(version, _)| *version > found) {
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", version)?;
    }
    tx.commit()?;

    info!(
        "event=schema_upgrade module=store status=ok from_version={} to_version={}",
        found, supported
    );
    Ok(())
}

/// Version recorded in the database file; `0` for a fresh file.
pub fn stored_version(conn: &Connection) -> StoreResult<u32> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?)
}

/// Rejects a `notes` table whose columns differ from [`NOTE_COLUMNS`].
pub fn check_note_columns(conn: &Connection) -> StoreResult<()> {
    let mut stmt = conn.prepare("PRAGMA table_info(notes);")?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>("name"))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    if columns.iter().map(String::as_str).eq(NOTE_COLUMNS) {
        return Ok(());
    }
    Err(StoreError::SchemaMismatch(format!(
        "notes columns are [{}], expected [{}]",
        columns.join(", "),
        NOTE_COLUMNS.join(", ")
    )))
}
