use rusqlite::Connection;
use shopfront_common::Result;

use crate::migrations::{Migration, execute_atomically};

pub struct CreateProductsTable;

impl Migration for CreateProductsTable {
    fn name(&self) -> &str {
        "20240101000002_create_products_table"
    }

    fn up(&self, conn: &Connection) -> Result<()> {
        execute_atomically(
            conn,
            "CREATE TABLE products (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                category_id INTEGER REFERENCES categories(id) ON DELETE SET NULL,
                name TEXT NOT NULL,
                slug TEXT NOT NULL UNIQUE,
                description TEXT NOT NULL DEFAULT '',
                price_cents INTEGER NOT NULL CHECK (price_cents >= 0),
                stock INTEGER NOT NULL DEFAULT 0 CHECK (stock >= 0),
                image_url TEXT,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );",
        )
    }

    fn down(&self, conn: &Connection) -> Result<()> {
        execute_atomically(conn, "DROP TABLE IF EXISTS products;")
    }
}
