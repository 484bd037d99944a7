use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use serde::Serialize;
use shopfront_common::Result;

use crate::database::{db_err, format_timestamp, parse_datetime};

/// The name of the table that records which units have been applied.
pub const MIGRATION_TABLE: &str = "migrations";

/// One applied unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationRecord {
    pub id: i64,
    pub name: String,
    pub batch: i64,
    pub executed_at: DateTime<Utc>,
}

/// Creates the tracking table if it doesn't exist.
pub(crate) fn ensure_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {MIGRATION_TABLE} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            migration TEXT NOT NULL UNIQUE,
            batch INTEGER NOT NULL,
            executed_at TEXT NOT NULL DEFAULT (datetime('now'))
        );"
    ))
    .map_err(db_err("failed to create migration table"))
}

/// Every applied unit in application order.
pub(crate) fn executed(conn: &Connection) -> Result<Vec<MigrationRecord>> {
    query_records(
        conn,
        &format!("SELECT id, migration, batch, executed_at FROM {MIGRATION_TABLE} ORDER BY id ASC"),
        params![],
    )
}

/// Units of one batch in application order.
pub(crate) fn records_in_batch(conn: &Connection, batch: i64) -> Result<Vec<MigrationRecord>> {
    query_records(
        conn,
        &format!(
            "SELECT id, migration, batch, executed_at FROM {MIGRATION_TABLE}
             WHERE batch = ?1 ORDER BY id ASC"
        ),
        params![batch],
    )
}

pub(crate) fn max_batch(conn: &Connection) -> Result<Option<i64>> {
    conn.query_row(
        &format!("SELECT MAX(batch) FROM {MIGRATION_TABLE}"),
        [],
        |row| row.get::<_, Option<i64>>(0),
    )
    .map_err(db_err("failed to read latest batch"))
}

pub(crate) fn record(conn: &Connection, name: &str, batch: i64, at: DateTime<Utc>) -> Result<()> {
    conn.execute(
        &format!("INSERT INTO {MIGRATION_TABLE} (migration, batch, executed_at) VALUES (?1, ?2, ?3)"),
        params![name, batch, format_timestamp(at)],
    )
    .map_err(db_err("failed to record migration"))?;
    Ok(())
}

pub(crate) fn forget(conn: &Connection, name: &str) -> Result<()> {
    conn.execute(
        &format!("DELETE FROM {MIGRATION_TABLE} WHERE migration = ?1"),
        params![name],
    )
    .map_err(db_err("failed to remove migration record"))?;
    Ok(())
}

fn query_records<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<MigrationRecord>> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(db_err("failed to prepare migration query"))?;
    let rows = stmt
        .query_map(params, |row| {
            Ok(MigrationRecord {
                id: row.get(0)?,
                name: row.get(1)?,
                batch: row.get(2)?,
                executed_at: parse_datetime(row.get::<_, String>(3)?),
            })
        })
        .map_err(db_err("failed to query migrations"))?;

    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(db_err("failed to read migration row"))
}
