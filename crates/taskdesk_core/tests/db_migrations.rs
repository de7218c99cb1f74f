use rusqlite::Connection;
use taskdesk_core::db::migrations::{current_user_version, latest_version};
use taskdesk_core::db::{open_db, open_db_in_memory, DbError};

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(current_user_version(&conn).unwrap(), latest_version());
    assert_table_exists(&conn, "collections");
}

#[test]
fn reopening_a_database_keeps_schema_and_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("taskdesk.db");

    let first = open_db(&path).unwrap();
    first
        .execute(
            "INSERT INTO collections (key, records) VALUES ('tasks', '[]');",
            [],
        )
        .unwrap();
    drop(first);

    let second = open_db(&path).unwrap();
    assert_eq!(current_user_version(&second).unwrap(), latest_version());
    let count: i64 = second
        .query_row("SELECT COUNT(*) FROM collections;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn collections_default_to_an_empty_array() {
    let conn = open_db_in_memory().unwrap();
    conn.execute("INSERT INTO collections (key) VALUES ('users');", [])
        .unwrap();

    let records: String = conn
        .query_row(
            "SELECT records FROM collections WHERE key = 'users';",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(records, "[]");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion { found, supported } => {
            assert_eq!(found, 999);
            assert_eq!(supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn open_db_creates_missing_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("profiles").join("default").join("taskdesk.db");

    let conn = open_db(&path).unwrap();

    assert!(path.exists());
    assert_table_exists(&conn, "collections");
}

#[test]
fn open_db_reports_uncreatable_directory() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"plain file").unwrap();

    let err = open_db(blocker.join("taskdesk.db")).unwrap_err();

    match err {
        DbError::CreateDir { path, .. } => assert_eq!(path, blocker),
        other => panic!("unexpected error: {other}"),
    }
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
