use lifeplan_core::db::migrations::latest_version;
use lifeplan_core::db::{open_db, open_db_in_memory, DbError};
use lifeplan_core::model::objective::Objective;
use lifeplan_core::repo::objective_repo::{ObjectiveRepository, SqliteObjectiveRepository};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    for table in ["objectives", "pillars", "metrics", "rituals", "tasks"] {
        assert_table_exists(&conn, table);
    }
}

#[test]
fn reopening_a_store_file_keeps_schema_and_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lifeplan.sqlite3");

    let conn_first = open_db(&path).unwrap();
    SqliteObjectiveRepository::try_new(&conn_first)
        .unwrap()
        .insert_objective(&Objective::new("local-1", "Fitness"))
        .unwrap();
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    let repo = SqliteObjectiveRepository::try_new(&conn_second).unwrap();
    assert_eq!(repo.list_objectives().unwrap().len(), 1);
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
fn deleting_an_objective_cascades_to_children() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "INSERT INTO objectives (id, name, status, priority, created_at)
         VALUES ('o-1', 'Fitness', 'active', 'medium', 0);
         INSERT INTO pillars (objective_id, id, position, name, weight, progress)
         VALUES ('o-1', 'p-1', 0, 'Strength', 1.0, 0);
         DELETE FROM objectives WHERE id = 'o-1';",
    )
    .unwrap();

    let pillars: i64 = conn
        .query_row("SELECT COUNT(*) FROM pillars;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(pillars, 0);
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
