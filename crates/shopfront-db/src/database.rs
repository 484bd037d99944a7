use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use shopfront_common::{Error, Result};
use tracing::info;

use crate::migrations::{MigrationManager, MigrationRegistry};

/// Format used for every timestamp column. Matches SQLite's `datetime('now')`
/// so defaults written by the database and values written from Rust compare
/// correctly as text.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Open a single connection with the pragmas every caller expects.
pub fn open_connection(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(db_path)
        .map_err(|e| Error::Database(format!("failed to open database: {e}")))?;
    apply_pragmas(&conn)?;
    Ok(conn)
}

pub fn open_in_memory_connection() -> Result<Connection> {
    let conn = Connection::open_in_memory()
        .map_err(|e| Error::Database(format!("failed to open in-memory database: {e}")))?;
    apply_pragmas(&conn)?;
    Ok(conn)
}

fn apply_pragmas(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
        .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))
}

/// Shared handle used by the web server. Access is serialized through a mutex;
/// repository methods live in `impl Database` blocks next to their queries.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(db_path: &Path) -> Result<Self> {
        info!("opening database at {}", db_path.display());
        let conn = open_connection(db_path)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = open_in_memory_connection()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database with every built-in migration applied.
    pub fn in_memory_migrated() -> Result<Self> {
        let db = Self::in_memory()?;
        {
            let conn = db.connection()?;
            let report = MigrationManager::new(&conn, MigrationRegistry::builtin()?).migrate()?;
            if let Some(failure) = report.failure {
                return Err(Error::Migration(format!(
                    "{} failed: {}",
                    failure.name, failure.reason
                )));
            }
        }
        Ok(db)
    }

    pub fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Database("database lock poisoned".into()))
    }
}

/// Wrap a rusqlite error with a short description of what was attempted.
pub(crate) fn db_err(context: &'static str) -> impl Fn(rusqlite::Error) -> Error {
    move |e| Error::Database(format!("{context}: {e}"))
}

pub(crate) fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

pub(crate) fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.format(TIMESTAMP_FORMAT).to_string()
}

pub(crate) fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(&s, TIMESTAMP_FORMAT)
                .map(|naive| naive.and_utc())
                .unwrap_or_else(|_| Utc::now())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_round_trip_through_text() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap();
        let text = format_timestamp(dt);
        assert_eq!(text, "2024-03-09 14:05:00");
        assert_eq!(parse_datetime(text), dt);
    }

    #[test]
    fn open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("shop.db");
        let db = Database::open(&path).unwrap();
        drop(db);
        assert!(path.exists());
    }

    #[test]
    fn migrated_database_has_storefront_tables() {
        let db = Database::in_memory_migrated().unwrap();
        let conn = db.connection().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type='table'
                 AND name IN ('categories', 'products', 'users', 'orders', 'order_items', 'sessions')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 6);
    }
}
