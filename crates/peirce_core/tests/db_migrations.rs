use peirce_core::db::migrations::latest_version;
use peirce_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::{params, Connection};

const CUT_ROW: &str = "INSERT INTO graph_objects (object_uuid, kind, parent_uuid, boundary, label, seq)
     VALUES (?1, 'cut', ?2, ?3, NULL, ?4);";

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

#[test]
fn fresh_database_has_graph_and_settings_schema() {
    let conn = setup();

    assert_eq!(schema_version(&conn), latest_version());
    assert_eq!(
        columns(&conn, "graph_objects"),
        ["object_uuid", "kind", "parent_uuid", "boundary", "label", "seq"]
    );
    assert_eq!(columns(&conn, "settings"), ["key", "value", "updated_at"]);
}

#[test]
fn version_one_file_upgrades_and_keeps_saved_graph() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("graph-v1.db");

    {
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(include_str!("../src/db/migrations/0001_init.sql"))
            .unwrap();
        conn.execute_batch("PRAGMA user_version = 1;").unwrap();
        conn.execute(
            CUT_ROW,
            params!["00000000-0000-4000-8000-00000000000a", None::<String>, 7, 0],
        )
        .unwrap();
    }

    let conn = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn), latest_version());
    let boundary: i64 = conn
        .query_row("SELECT boundary FROM graph_objects;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(boundary, 7);
    assert_eq!(columns(&conn, "settings").len(), 3);
}

#[test]
fn newer_schema_is_refused_without_downgrade() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");
    {
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    }

    let err = open_db(&path).unwrap_err();
    assert!(matches!(
        err,
        DbError::UnsupportedSchemaVersion { db_version: 999, latest_supported }
            if latest_supported == latest_version()
    ));

    let conn = Connection::open(&path).unwrap();
    assert_eq!(schema_version(&conn), 999);
}

#[test]
fn symbol_rows_require_label() {
    let conn = setup();
    let err = conn
        .execute(
            "INSERT INTO graph_objects (object_uuid, kind, parent_uuid, boundary, label, seq)
             VALUES ('00000000-0000-4000-8000-000000000001', 'symbol', NULL, 1, NULL, 0);",
            [],
        )
        .unwrap_err();
    assert!(err.to_string().contains("CHECK"));
}

#[test]
fn creation_order_is_unique() {
    let conn = setup();
    conn.execute(
        CUT_ROW,
        params!["00000000-0000-4000-8000-000000000001", None::<String>, 1, 0],
    )
    .unwrap();
    let err = conn
        .execute(
            CUT_ROW,
            params!["00000000-0000-4000-8000-000000000002", None::<String>, 2, 0],
        )
        .unwrap_err();
    assert!(err.to_string().contains("UNIQUE"));
}

#[test]
fn parent_links_are_checked_at_commit() {
    let mut conn = setup();
    let child = "00000000-0000-4000-8000-000000000002";
    let parent = "00000000-0000-4000-8000-000000000001";

    // Children may be written before their parent inside one transaction.
    let tx = conn.transaction().unwrap();
    tx.execute(CUT_ROW, params![child, Some(parent), 2, 1]).unwrap();
    tx.execute(CUT_ROW, params![parent, None::<String>, 1, 0]).unwrap();
    tx.commit().unwrap();

    let tx = conn.transaction().unwrap();
    tx.execute(
        CUT_ROW,
        params![
            "00000000-0000-4000-8000-000000000003",
            Some("00000000-0000-4000-8000-0000000000ff"),
            3,
            2
        ],
    )
    .unwrap();
    assert!(tx.commit().is_err());
}

#[test]
fn settings_keys_are_unique_and_stamped() {
    let conn = setup();
    conn.execute(
        "INSERT INTO settings (key, value) VALUES ('proof_mode', 'active');",
        [],
    )
    .unwrap();
    assert!(conn
        .execute(
            "INSERT INTO settings (key, value) VALUES ('proof_mode', 'inactive');",
            [],
        )
        .is_err());

    let stamped: i64 = conn
        .query_row(
            "SELECT updated_at FROM settings WHERE key = 'proof_mode';",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert!(stamped > 0);
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn columns(conn: &Connection, table: &str) -> Vec<String> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table});"))
        .unwrap();
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    names
}
