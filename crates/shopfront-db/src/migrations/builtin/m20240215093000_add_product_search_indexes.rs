use rusqlite::Connection;
use shopfront_common::Result;

use crate::migrations::{Migration, execute_atomically};

pub struct AddProductSearchIndexes;

impl Migration for AddProductSearchIndexes {
    fn name(&self) -> &str {
        "20240215093000_add_product_search_indexes"
    }

    fn up(&self, conn: &Connection) -> Result<()> {
        execute_atomically(
            conn,
            "CREATE INDEX idx_products_category_active ON products(category_id, is_active);
             CREATE INDEX idx_products_name ON products(name COLLATE NOCASE);",
        )
    }

    fn down(&self, conn: &Connection) -> Result<()> {
        execute_atomically(
            conn,
            "DROP INDEX IF EXISTS idx_products_name;
             DROP INDEX IF EXISTS idx_products_category_active;",
        )
    }
}
