use rusqlite::Connection;
use shopfront_common::Result;

use crate::migrations::{Migration, execute_atomically};

/// Orders and their line items. Line items snapshot the product name and
/// price so later catalog edits don't rewrite order history.
pub struct CreateOrdersTables;

impl Migration for CreateOrdersTables {
    fn name(&self) -> &str {
        "20240101000004_create_orders_tables"
    }

    fn up(&self, conn: &Connection) -> Result<()> {
        execute_atomically(
            conn,
            "CREATE TABLE orders (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
                customer_name TEXT NOT NULL,
                customer_email TEXT NOT NULL,
                shipping_address TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                total_cents INTEGER NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE order_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                order_id INTEGER NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
                product_id INTEGER REFERENCES products(id) ON DELETE SET NULL,
                product_name TEXT NOT NULL,
                unit_price_cents INTEGER NOT NULL,
                quantity INTEGER NOT NULL CHECK (quantity > 0)
            );

            CREATE INDEX idx_orders_user ON orders(user_id, created_at);
            CREATE INDEX idx_order_items_order ON order_items(order_id);",
        )
    }

    fn down(&self, conn: &Connection) -> Result<()> {
        execute_atomically(
            conn,
            "DROP TABLE IF EXISTS order_items;
             DROP TABLE IF EXISTS orders;",
        )
    }
}
