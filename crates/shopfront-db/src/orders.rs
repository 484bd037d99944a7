use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::Serialize;
use shopfront_common::{Error, Money, OrderStatus, Result};
use tracing::info;

use crate::database::{Database, db_err, format_timestamp, parse_datetime};

/// One product and quantity taken from a cart at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartLine {
    pub product_id: i64,
    pub quantity: u32,
}

#[derive(Debug, Clone)]
pub struct CheckoutDetails {
    pub user_id: Option<i64>,
    pub customer_name: String,
    pub customer_email: String,
    pub shipping_address: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: i64,
    pub user_id: Option<i64>,
    pub customer_name: String,
    pub customer_email: String,
    pub shipping_address: String,
    pub status: OrderStatus,
    pub total: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

impl Order {
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderItem {
    pub product_id: Option<i64>,
    pub product_name: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub line_total: Money,
}

/// Numbers shown on the backoffice dashboard.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DashboardStats {
    pub products: i64,
    pub active_products: i64,
    pub low_stock_products: i64,
    pub categories: i64,
    pub users: i64,
    pub orders: i64,
    pub pending_orders: i64,
    /// Sum of every order that was not cancelled.
    pub revenue: Money,
}

/// Products with this many units or fewer count as low stock.
pub const LOW_STOCK_THRESHOLD: i64 = 3;

const ORDER_SELECT: &str = "SELECT id, user_id, customer_name, customer_email, shipping_address,
        status, total_cents, created_at, updated_at
     FROM orders";

fn order_from_row(row: &Row<'_>) -> rusqlite::Result<Order> {
    let status: String = row.get(5)?;
    let status = status.parse::<OrderStatus>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Order {
        id: row.get(0)?,
        user_id: row.get(1)?,
        customer_name: row.get(2)?,
        customer_email: row.get(3)?,
        shipping_address: row.get(4)?,
        status,
        total: Money::from_cents(row.get(6)?),
        created_at: parse_datetime(row.get::<_, String>(7)?),
        updated_at: parse_datetime(row.get::<_, String>(8)?),
        items: Vec::new(),
    })
}

fn load_items(conn: &Connection, order_id: i64) -> Result<Vec<OrderItem>> {
    let mut stmt = conn
        .prepare(
            "SELECT product_id, product_name, unit_price_cents, quantity
             FROM order_items WHERE order_id = ?1 ORDER BY id ASC",
        )
        .map_err(db_err("failed to prepare order item query"))?;
    let rows = stmt
        .query_map(params![order_id], |row| {
            let unit_price = Money::from_cents(row.get(2)?);
            let quantity: u32 = row.get(3)?;
            let line_total = unit_price.times(quantity).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    2,
                    rusqlite::types::Type::Integer,
                    Box::new(e),
                )
            })?;
            Ok(OrderItem {
                product_id: row.get(0)?,
                product_name: row.get(1)?,
                unit_price,
                quantity,
                line_total,
            })
        })
        .map_err(db_err("failed to query order items"))?;
    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(db_err("failed to read order item row"))
}

fn query_orders<P: rusqlite::Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<Order>> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(db_err("failed to prepare order query"))?;
    let rows = stmt
        .query_map(params, order_from_row)
        .map_err(db_err("failed to query orders"))?;
    let mut orders = rows
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(db_err("failed to read order row"))?;

    for order in &mut orders {
        order.items = load_items(conn, order.id)?;
    }
    Ok(orders)
}

fn count(conn: &Connection, sql: &str) -> Result<i64> {
    conn.query_row(sql, [], |row| row.get(0))
        .map_err(db_err("failed to compute dashboard stats"))
}

impl Database {
    /// Turn cart lines into an order. Stock is checked and decremented in the
    /// same transaction that writes the order, so a failed line leaves
    /// nothing behind.
    pub fn place_order(&self, details: &CheckoutDetails, lines: &[CartLine]) -> Result<i64> {
        if lines.is_empty() {
            return Err(Error::Validation("your cart is empty".into()));
        }

        let conn = self.connection()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(db_err("failed to begin checkout"))?;

        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            if line.quantity == 0 {
                return Err(Error::Validation("quantities must be at least 1".into()));
            }

            let product: Option<(String, i64, i64, bool)> = tx
                .query_row(
                    "SELECT name, price_cents, stock, is_active FROM products WHERE id = ?1",
                    params![line.product_id],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
                )
                .optional()
                .map_err(db_err("failed to load product"))?;

            let Some((name, price_cents, stock, is_active)) = product else {
                return Err(Error::Validation(
                    "a product in your cart is no longer available".into(),
                ));
            };
            if !is_active {
                return Err(Error::Validation(format!("{name} is no longer available")));
            }
            if stock < i64::from(line.quantity) {
                return Err(Error::Validation(format!(
                    "only {stock} of {name} left in stock"
                )));
            }

            tx.execute(
                "UPDATE products SET stock = stock - ?1, updated_at = ?2 WHERE id = ?3",
                params![line.quantity, format_timestamp(Utc::now()), line.product_id],
            )
            .map_err(db_err("failed to reserve stock"))?;

            let unit_price = Money::from_cents(price_cents);
            items.push(OrderItem {
                product_id: Some(line.product_id),
                product_name: name,
                unit_price,
                quantity: line.quantity,
                line_total: unit_price.times(line.quantity)?,
            });
        }

        let total = Money::total(items.iter().map(|item| item.line_total))?;
        tx.execute(
            "INSERT INTO orders
                (user_id, customer_name, customer_email, shipping_address, status, total_cents)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                details.user_id,
                details.customer_name.trim(),
                details.customer_email.trim(),
                details.shipping_address.trim(),
                OrderStatus::Pending.as_str(),
                total.cents(),
            ],
        )
        .map_err(db_err("failed to create order"))?;
        let order_id = tx.last_insert_rowid();

        for item in &items {
            tx.execute(
                "INSERT INTO order_items (order_id, product_id, product_name, unit_price_cents, quantity)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    order_id,
                    item.product_id,
                    item.product_name,
                    item.unit_price.cents(),
                    item.quantity,
                ],
            )
            .map_err(db_err("failed to add order item"))?;
        }

        tx.commit().map_err(db_err("failed to commit checkout"))?;
        info!("placed order {order_id} ({} line(s), total {total})", items.len());
        Ok(order_id)
    }

    pub fn order_by_id(&self, id: i64) -> Result<Option<Order>> {
        let conn = self.connection()?;
        let order = conn
            .query_row(
                &format!("{ORDER_SELECT} WHERE id = ?1"),
                params![id],
                order_from_row,
            )
            .optional()
            .map_err(db_err("failed to load order"))?;

        match order {
            Some(mut order) => {
                order.items = load_items(&conn, order.id)?;
                Ok(Some(order))
            }
            None => Ok(None),
        }
    }

    pub fn orders_for_user(&self, user_id: i64) -> Result<Vec<Order>> {
        let conn = self.connection()?;
        query_orders(
            &conn,
            &format!("{ORDER_SELECT} WHERE user_id = ?1 ORDER BY created_at DESC, id DESC"),
            params![user_id],
        )
    }

    /// Backoffice listing, newest first.
    pub fn list_orders(&self, status: Option<OrderStatus>) -> Result<Vec<Order>> {
        let conn = self.connection()?;
        query_orders(
            &conn,
            &format!(
                "{ORDER_SELECT} WHERE (?1 IS NULL OR status = ?1)
                 ORDER BY created_at DESC, id DESC"
            ),
            params![status.map(OrderStatus::as_str)],
        )
    }

    /// Move an order to `status`. Cancelling returns the stock; a cancelled
    /// order cannot be reopened.
    pub fn update_order_status(&self, id: i64, status: OrderStatus) -> Result<()> {
        let conn = self.connection()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(db_err("failed to begin status update"))?;

        let current: Option<String> = tx
            .query_row(
                "SELECT status FROM orders WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err("failed to load order"))?;
        let current: OrderStatus = current
            .ok_or_else(|| Error::NotFound(format!("order {id}")))?
            .parse()?;

        if current == status {
            return Ok(());
        }
        if current.releases_stock() {
            return Err(Error::Validation("cancelled orders cannot be reopened".into()));
        }

        if status.releases_stock() {
            let items = load_items(&tx, id)?;
            for item in items {
                if let Some(product_id) = item.product_id {
                    tx.execute(
                        "UPDATE products SET stock = stock + ?1 WHERE id = ?2",
                        params![item.quantity, product_id],
                    )
                    .map_err(db_err("failed to restock product"))?;
                }
            }
        }

        tx.execute(
            "UPDATE orders SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), format_timestamp(Utc::now()), id],
        )
        .map_err(db_err("failed to update order status"))?;
        tx.commit().map_err(db_err("failed to commit status update"))?;

        info!("order {id} moved from {current} to {status}");
        Ok(())
    }

    pub fn dashboard_stats(&self) -> Result<DashboardStats> {
        let users = self.user_count()?;
        let conn = self.connection()?;
        Ok(DashboardStats {
            products: count(&conn, "SELECT COUNT(*) FROM products")?,
            active_products: count(&conn, "SELECT COUNT(*) FROM products WHERE is_active = 1")?,
            low_stock_products: conn
                .query_row(
                    "SELECT COUNT(*) FROM products WHERE is_active = 1 AND stock <= ?1",
                    params![LOW_STOCK_THRESHOLD],
                    |row| row.get(0),
                )
                .map_err(db_err("failed to compute dashboard stats"))?,
            categories: count(&conn, "SELECT COUNT(*) FROM categories")?,
            users,
            orders: count(&conn, "SELECT COUNT(*) FROM orders")?,
            pending_orders: count(&conn, "SELECT COUNT(*) FROM orders WHERE status = 'pending'")?,
            revenue: Money::from_cents(count(
                &conn,
                "SELECT COALESCE(SUM(total_cents), 0) FROM orders WHERE status != 'cancelled'",
            )?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ProductInput;

    fn product(db: &Database, name: &str, cents: i64, stock: i64) -> i64 {
        db.create_product(&ProductInput {
            category_id: None,
            name: name.to_string(),
            description: String::new(),
            price: Money::from_cents(cents),
            stock,
            image_url: None,
            is_active: true,
        })
        .unwrap()
    }

    fn details() -> CheckoutDetails {
        CheckoutDetails {
            user_id: None,
            customer_name: "Grace".to_string(),
            customer_email: "grace@example.com".to_string(),
            shipping_address: "1 Harbour Road".to_string(),
        }
    }

    fn stock(db: &Database, id: i64) -> i64 {
        db.product_by_id(id).unwrap().unwrap().stock
    }

    #[test]
    fn placing_an_order_snapshots_prices_and_decrements_stock() {
        let db = Database::in_memory_migrated().unwrap();
        let beans = product(&db, "Beans", 1250, 10);
        let filter = product(&db, "Filters", 300, 5);

        let order_id = db
            .place_order(
                &details(),
                &[
                    CartLine { product_id: beans, quantity: 2 },
                    CartLine { product_id: filter, quantity: 1 },
                ],
            )
            .unwrap();

        let order = db.order_by_id(order_id).unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total.cents(), 2 * 1250 + 300);
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.item_count(), 3);
        assert_eq!(order.items[0].line_total.cents(), 2500);
        assert_eq!(stock(&db, beans), 8);
        assert_eq!(stock(&db, filter), 4);
    }

    #[test]
    fn insufficient_stock_rolls_back_every_line() {
        let db = Database::in_memory_migrated().unwrap();
        let beans = product(&db, "Beans", 1250, 10);
        let rare = product(&db, "Rare", 9900, 1);

        let err = db
            .place_order(
                &details(),
                &[
                    CartLine { product_id: beans, quantity: 2 },
                    CartLine { product_id: rare, quantity: 2 },
                ],
            )
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(stock(&db, beans), 10);
        assert!(db.list_orders(None).unwrap().is_empty());
    }

    #[test]
    fn oversized_totals_are_rejected_without_poisoning_the_connection() {
        let db = Database::in_memory_migrated().unwrap();
        let yacht = product(&db, "Yacht", 100, 5);
        // Rows written before the price ceiling existed can still hold huge prices.
        db.connection()
            .unwrap()
            .execute(
                "UPDATE products SET price_cents = ?1 WHERE id = ?2",
                params![i64::MAX - 1, yacht],
            )
            .unwrap();

        let err = db
            .place_order(&details(), &[CartLine { product_id: yacht, quantity: 2 }])
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(stock(&db, yacht), 5);
        assert!(db.list_orders(None).unwrap().is_empty());
        assert!(db.list_categories().is_ok());
    }

    #[test]
    fn empty_cart_and_missing_products_are_rejected() {
        let db = Database::in_memory_migrated().unwrap();
        assert!(db.place_order(&details(), &[]).is_err());
        let missing = [CartLine { product_id: 404, quantity: 1 }];
        assert!(matches!(db.place_order(&details(), &missing), Err(Error::Validation(_))));
    }

    #[test]
    fn cancelling_restocks_and_is_final() {
        let db = Database::in_memory_migrated().unwrap();
        let beans = product(&db, "Beans", 1250, 5);
        let order_id = db
            .place_order(&details(), &[CartLine { product_id: beans, quantity: 3 }])
            .unwrap();
        assert_eq!(stock(&db, beans), 2);

        db.update_order_status(order_id, OrderStatus::Paid).unwrap();
        db.update_order_status(order_id, OrderStatus::Cancelled).unwrap();
        assert_eq!(stock(&db, beans), 5);

        let err = db.update_order_status(order_id, OrderStatus::Shipped).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(matches!(
            db.update_order_status(999, OrderStatus::Paid),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn lists_orders_by_user_and_status() {
        let db = Database::in_memory_migrated().unwrap();
        let beans = product(&db, "Beans", 1000, 10);
        let mut mine = details();
        mine.user_id = Some(
            db.create_user(&crate::users::NewUser {
                email: "grace@example.com",
                name: "Grace",
                password_hash: "x",
                is_admin: false,
            })
            .unwrap(),
        );

        let first = db
            .place_order(&mine, &[CartLine { product_id: beans, quantity: 1 }])
            .unwrap();
        db.place_order(&details(), &[CartLine { product_id: beans, quantity: 1 }])
            .unwrap();
        db.update_order_status(first, OrderStatus::Shipped).unwrap();

        assert_eq!(db.orders_for_user(mine.user_id.unwrap()).unwrap().len(), 1);
        assert_eq!(db.list_orders(None).unwrap().len(), 2);
        assert_eq!(db.list_orders(Some(OrderStatus::Shipped)).unwrap().len(), 1);
        assert_eq!(db.list_orders(Some(OrderStatus::Pending)).unwrap().len(), 1);
    }

    #[test]
    fn dashboard_excludes_cancelled_revenue() {
        let db = Database::in_memory_migrated().unwrap();
        let beans = product(&db, "Beans", 1000, 10);
        let kept = db
            .place_order(&details(), &[CartLine { product_id: beans, quantity: 2 }])
            .unwrap();
        let cancelled = db
            .place_order(&details(), &[CartLine { product_id: beans, quantity: 1 }])
            .unwrap();
        db.update_order_status(cancelled, OrderStatus::Cancelled).unwrap();
        db.update_order_status(kept, OrderStatus::Paid).unwrap();

        let stats = db.dashboard_stats().unwrap();
        assert_eq!(stats.orders, 2);
        assert_eq!(stats.pending_orders, 0);
        assert_eq!(stats.revenue.cents(), 2000);
        assert_eq!(stats.products, 1);
        assert_eq!(stats.low_stock_products, 0);
        assert_eq!(stats.users, 0);
    }

    #[test]
    fn dashboard_counts_accounts() {
        let db = Database::in_memory_migrated().unwrap();
        for email in ["a@example.com", "b@example.com"] {
            db.create_user(&crate::users::NewUser {
                email,
                name: "Someone",
                password_hash: "hash",
                is_admin: false,
            })
            .unwrap();
        }
        assert_eq!(db.dashboard_stats().unwrap().users, 2);
    }
}
