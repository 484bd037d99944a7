use rusqlite::Connection;
use shopfront_common::Result;

use crate::migrations::{Migration, execute_atomically};

pub struct CreateUsersTable;

impl Migration for CreateUsersTable {
    fn name(&self) -> &str {
        "20240101000003_create_users_table"
    }

    fn up(&self, conn: &Connection) -> Result<()> {
        execute_atomically(
            conn,
            "CREATE TABLE users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password_hash TEXT NOT NULL,
                name TEXT NOT NULL,
                is_admin INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );",
        )
    }

    fn down(&self, conn: &Connection) -> Result<()> {
        execute_atomically(conn, "DROP TABLE IF EXISTS users;")
    }
}
