use rusqlite::Connection;
use shopfront_common::Result;

use crate::migrations::{Migration, execute_atomically};

pub struct CreateCategoriesTable;

impl Migration for CreateCategoriesTable {
    fn name(&self) -> &str {
        "20240101000001_create_categories_table"
    }

    fn up(&self, conn: &Connection) -> Result<()> {
        execute_atomically(
            conn,
            "CREATE TABLE categories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                slug TEXT NOT NULL UNIQUE,
                description TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );",
        )
    }

    fn down(&self, conn: &Connection) -> Result<()> {
        execute_atomically(conn, "DROP TABLE IF EXISTS categories;")
    }
}
