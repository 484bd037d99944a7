use rusqlite::Connection;
use shopfront_common::Result;

use crate::migrations::{Migration, execute_atomically};

pub struct CreateSessionsTable;

impl Migration for CreateSessionsTable {
    fn name(&self) -> &str {
        "20240101000005_create_sessions_table"
    }

    fn up(&self, conn: &Connection) -> Result<()> {
        execute_atomically(
            conn,
            "CREATE TABLE sessions (
                id TEXT PRIMARY KEY,
                data TEXT NOT NULL DEFAULT '{}',
                last_activity TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_sessions_last_activity ON sessions(last_activity);",
        )
    }

    fn down(&self, conn: &Connection) -> Result<()> {
        execute_atomically(conn, "DROP TABLE IF EXISTS sessions;")
    }
}
