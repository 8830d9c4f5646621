use catalog_core::db::migrations::latest_version;
use catalog_core::db::{open_db, open_db_in_memory, open_db_with_script, DbError};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "authors");
    assert_table_exists(&conn, "books");
    assert_index_exists(&conn, "idx_books_author_id");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("biblioteca.db");

    let conn_first = open_db(&path).unwrap();
    conn_first
        .execute("INSERT INTO authors (name) VALUES (?1);", ["Isabel Allende"])
        .unwrap();
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    let count: i64 = conn_second
        .query_row("SELECT COUNT(*) FROM authors;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
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
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn script_runs_against_fresh_file_before_migrations() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("seeded.db");
    let script = dir.path().join("seed.sql");
    std::fs::write(
        &script,
        "CREATE TABLE authors (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL);
         INSERT INTO authors (name) VALUES ('Jorge Luis Borges');",
    )
    .unwrap();

    let stale = Connection::open(&path).unwrap();
    stale
        .execute_batch("CREATE TABLE leftovers (id INTEGER);")
        .unwrap();
    drop(stale);

    let conn = open_db_with_script(&path, &script).unwrap();
    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "books");
    let leftovers: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE name = 'leftovers';",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(leftovers, 0);
    let name: String = conn
        .query_row("SELECT name FROM authors;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(name, "Jorge Luis Borges");
}

#[test]
fn missing_script_returns_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = open_db_with_script(dir.path().join("x.db"), dir.path().join("missing.sql"))
        .unwrap_err();
    assert!(matches!(err, DbError::Io(_)));
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    assert_schema_object(conn, "table", table_name);
}

fn assert_index_exists(conn: &Connection, index_name: &str) {
    assert_schema_object(conn, "index", index_name);
}

fn assert_schema_object(conn: &Connection, kind: &str, name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = ?1 AND name = ?2
            );",
            [kind, name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "{kind} {name} does not exist");
}
