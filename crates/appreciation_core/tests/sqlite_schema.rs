use appreciation_core::store::sqlite::schema::{
    check_note_columns, open_file, open_memory, schema_version, stored_version, upgrade,
    NOTE_COLUMNS,
};
use appreciation_core::{SqliteNoteStore, StoreError};
use rusqlite::Connection;

#[test]
fn fresh_database_gets_the_notes_table() {
    let conn = open_memory().unwrap();
    assert_eq!(stored_version(&conn).unwrap(), schema_version());

    let columns: Vec<String> = conn
        .prepare("PRAGMA table_info(notes);")
        .unwrap()
        .query_map([], |row| row.get::<_, String>(1))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(columns, NOTE_COLUMNS);
    check_note_columns(&conn).unwrap();
}

#[test]
fn reopening_a_file_does_not_upgrade_twice() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("board.sqlite3");
    drop(open_file(&path).unwrap());

    let mut conn = open_file(&path).unwrap();
    upgrade(&mut conn).unwrap();
    assert_eq!(stored_version(&conn).unwrap(), schema_version());
}

#[test]
fn file_from_a_newer_build_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");
    Connection::open(&path)
        .unwrap()
        .execute_batch(&format!("PRAGMA user_version = {};", schema_version() + 1))
        .unwrap();

    let err = SqliteNoteStore::open(&path).err().unwrap();
    assert!(matches!(
        err,
        StoreError::SchemaTooNew { found, supported }
            if found == schema_version() + 1 && supported == schema_version()
    ));
}

#[test]
fn file_with_a_foreign_notes_table_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("other_app.sqlite3");
    Connection::open(&path)
        .unwrap()
        .execute_batch(&format!(
            "CREATE TABLE notes (id TEXT PRIMARY KEY, title TEXT, body TEXT);
             PRAGMA user_version = {};",
            schema_version()
        ))
        .unwrap();

    assert!(matches!(
        SqliteNoteStore::open(&path),
        Err(StoreError::SchemaMismatch(_))
    ));
}

#[test]
fn schema_rejects_blank_messages_and_unknown_roles() {
    let conn = open_memory().unwrap();
    assert!(conn
        .execute(
            "INSERT INTO notes (id, role, message, response, created_at)
             VALUES ('a', 'Student', '   ', NULL, 1);",
            [],
        )
        .is_err());
    assert!(conn
        .execute(
            "INSERT INTO notes (id, role, message, response, created_at)
             VALUES ('b', 'Teacher', 'hi', NULL, 1);",
            [],
        )
        .is_err());
}
