use projtree_core::db::migrations::latest_version;
use projtree_core::db::{open_db, open_db_in_memory, DbError};
use projtree_core::{GatewayError, SqliteProjectGateway, TransportFailure};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "employees");
    assert_table_exists(&conn, "projects");
    assert_table_exists(&conn, "project_participants");
}

#[test]
fn reopening_file_database_keeps_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("projtree.sqlite3");

    let conn = open_db(&path).unwrap();
    conn.execute(
        "INSERT INTO projects (title, max_participants) VALUES ('Apollo', 2);",
        [],
    )
    .unwrap();
    drop(conn);

    let conn = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn), latest_version());
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM projects;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
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
fn gateway_refuses_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();
    let err = SqliteProjectGateway::try_new(&conn).err().unwrap();
    assert!(matches!(
        err,
        GatewayError::Transport(TransportFailure::Storage(DbError::UninitializedConnection {
            actual_version: 0,
            ..
        }))
    ));
}

#[test]
fn schema_rejects_out_of_range_rank_and_negative_capacity() {
    let conn = open_db_in_memory().unwrap();
    assert!(conn
        .execute("INSERT INTO employees (name, rank) VALUES ('Eve', 5);", [])
        .is_err());
    assert!(conn
        .execute(
            "INSERT INTO projects (title, max_participants) VALUES ('Bad', -1);",
            [],
        )
        .is_err());
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
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
