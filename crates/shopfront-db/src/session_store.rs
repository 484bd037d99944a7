use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{OptionalExtension, params};
use serde::{Deserialize, Serialize};
use shopfront_common::{Error, Result};
use tracing::{debug, info};
use uuid::Uuid;

use crate::database::{Database, db_err, format_timestamp, parse_datetime};
use crate::orders::CartLine;

/// A one-shot message shown on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    Info,
    Error,
}

/// Everything a visitor carries between requests. Stored as JSON in the
/// `sessions.data` column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionData {
    pub user_id: Option<i64>,
    /// Product id to quantity.
    pub cart: BTreeMap<i64, u32>,
    pub flash: Option<Flash>,
    /// Orders placed from this session, so guests can view their receipts.
    pub placed_orders: Vec<i64>,
}

impl SessionData {
    pub fn add_to_cart(&mut self, product_id: i64, quantity: u32) {
        if quantity == 0 {
            return;
        }
        let entry = self.cart.entry(product_id).or_insert(0);
        *entry = entry.saturating_add(quantity);
    }

    /// Set the quantity of a line. Zero removes it.
    pub fn set_quantity(&mut self, product_id: i64, quantity: u32) {
        if quantity == 0 {
            self.cart.remove(&product_id);
        } else {
            self.cart.insert(product_id, quantity);
        }
    }

    pub fn remove_from_cart(&mut self, product_id: i64) {
        self.cart.remove(&product_id);
    }

    pub fn clear_cart(&mut self) {
        self.cart.clear();
    }

    pub fn cart_count(&self) -> u32 {
        self.cart.values().copied().sum()
    }

    pub fn cart_lines(&self) -> Vec<CartLine> {
        self.cart
            .iter()
            .map(|(&product_id, &quantity)| CartLine {
                product_id,
                quantity,
            })
            .collect()
    }

    pub fn set_flash(&mut self, kind: FlashKind, message: impl Into<String>) {
        self.flash = Some(Flash {
            kind,
            message: message.into(),
        });
    }

    pub fn take_flash(&mut self) -> Option<Flash> {
        self.flash.take()
    }

    pub fn owns_order(&self, order_id: i64) -> bool {
        self.placed_orders.contains(&order_id)
    }
}

/// A session row: its id and decoded data.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub data: SessionData,
    pub last_activity: DateTime<Utc>,
}

fn decode(raw: &str) -> Result<SessionData> {
    serde_json::from_str(raw).map_err(Error::from)
}

impl Database {
    pub fn create_session(&self) -> Result<Session> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let data = SessionData::default();
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO sessions (id, data, last_activity) VALUES (?1, ?2, ?3)",
            params![id, serde_json::to_string(&data)?, format_timestamp(now)],
        )
        .map_err(db_err("failed to create session"))?;

        debug!("created session {id}");
        Ok(Session {
            id,
            data,
            last_activity: now,
        })
    }

    /// Load a session unless it has been idle for longer than `idle`.
    /// Expired rows are removed on sight.
    pub fn load_session(&self, id: &str, idle: Duration) -> Result<Option<Session>> {
        self.load_session_at(id, idle, Utc::now())
    }

    pub fn load_session_at(
        &self,
        id: &str,
        idle: Duration,
        now: DateTime<Utc>,
    ) -> Result<Option<Session>> {
        let conn = self.connection()?;
        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT data, last_activity FROM sessions WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(db_err("failed to load session"))?;

        let Some((raw, last_activity)) = row else {
            return Ok(None);
        };
        let last_activity = parse_datetime(last_activity);

        if now - last_activity > idle {
            conn.execute("DELETE FROM sessions WHERE id = ?1", params![id])
                .map_err(db_err("failed to delete expired session"))?;
            debug!("session {id} expired");
            return Ok(None);
        }

        // Corrupt data starts the visitor over with an empty session.
        let data = decode(&raw).unwrap_or_default();
        Ok(Some(Session {
            id: id.to_string(),
            data,
            last_activity,
        }))
    }

    /// Persist the session data and refresh its activity time.
    pub fn save_session(&self, id: &str, data: &SessionData) -> Result<()> {
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO sessions (id, data, last_activity) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET data = excluded.data, last_activity = excluded.last_activity",
            params![id, serde_json::to_string(data)?, format_timestamp(Utc::now())],
        )
        .map_err(db_err("failed to save session"))?;
        Ok(())
    }

    pub fn delete_session(&self, id: &str) -> Result<()> {
        let conn = self.connection()?;
        conn.execute("DELETE FROM sessions WHERE id = ?1", params![id])
            .map_err(db_err("failed to delete session"))?;
        Ok(())
    }

    /// Remove every session idle for longer than `idle`. Returns how many went.
    pub fn purge_expired_sessions(&self, idle: Duration) -> Result<usize> {
        let cutoff = format_timestamp(Utc::now() - idle);
        let conn = self.connection()?;
        let removed = conn
            .execute(
                "DELETE FROM sessions WHERE last_activity < ?1",
                params![cutoff],
            )
            .map_err(db_err("failed to purge sessions"))?;
        if removed > 0 {
            info!("purged {removed} expired session(s)");
        }
        Ok(removed)
    }

    pub fn session_count(&self) -> Result<i64> {
        let conn = self.connection()?;
        conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
            .map_err(db_err("failed to count sessions"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle() -> Duration {
        Duration::minutes(30)
    }

    #[test]
    fn cart_helpers() {
        let mut data = SessionData::default();
        data.add_to_cart(7, 2);
        data.add_to_cart(7, 1);
        data.add_to_cart(3, 1);
        data.add_to_cart(9, 0);
        assert_eq!(data.cart_count(), 4);
        assert_eq!(
            data.cart_lines(),
            vec![
                CartLine { product_id: 3, quantity: 1 },
                CartLine { product_id: 7, quantity: 3 },
            ]
        );

        data.set_quantity(7, 0);
        assert_eq!(data.cart_count(), 1);
        data.remove_from_cart(3);
        assert!(data.cart.is_empty());
    }

    #[test]
    fn flash_is_taken_once() {
        let mut data = SessionData::default();
        data.set_flash(FlashKind::Info, "Added to cart");
        assert_eq!(data.take_flash().unwrap().message, "Added to cart");
        assert!(data.take_flash().is_none());
    }

    #[test]
    fn save_and_reload() {
        let db = Database::in_memory_migrated().unwrap();
        let session = db.create_session().unwrap();

        let mut data = session.data.clone();
        data.user_id = Some(4);
        data.add_to_cart(1, 2);
        db.save_session(&session.id, &data).unwrap();

        let loaded = db.load_session(&session.id, idle()).unwrap().unwrap();
        assert_eq!(loaded.data, data);
        assert!(db.load_session("missing", idle()).unwrap().is_none());
    }

    #[test]
    fn idle_sessions_expire_and_are_removed() {
        let db = Database::in_memory_migrated().unwrap();
        let session = db.create_session().unwrap();

        let soon = Utc::now() + Duration::minutes(29);
        assert!(db.load_session_at(&session.id, idle(), soon).unwrap().is_some());

        let later = Utc::now() + Duration::minutes(31);
        assert!(db.load_session_at(&session.id, idle(), later).unwrap().is_none());
        assert_eq!(db.session_count().unwrap(), 0);
    }

    #[test]
    fn purge_only_touches_stale_rows() {
        let db = Database::in_memory_migrated().unwrap();
        let fresh = db.create_session().unwrap();
        {
            let conn = db.connection().unwrap();
            conn.execute(
                "INSERT INTO sessions (id, data, last_activity) VALUES ('old', '{}', '2000-01-01 00:00:00')",
                [],
            )
            .unwrap();
        }

        assert_eq!(db.purge_expired_sessions(idle()).unwrap(), 1);
        assert!(db.load_session(&fresh.id, idle()).unwrap().is_some());
    }

    #[test]
    fn corrupt_data_falls_back_to_empty_session() {
        let db = Database::in_memory_migrated().unwrap();
        let session = db.create_session().unwrap();
        {
            let conn = db.connection().unwrap();
            conn.execute(
                "UPDATE sessions SET data = 'not json' WHERE id = ?1",
                params![session.id],
            )
            .unwrap();
        }
        let loaded = db.load_session(&session.id, idle()).unwrap().unwrap();
        assert_eq!(loaded.data, SessionData::default());
    }
}
