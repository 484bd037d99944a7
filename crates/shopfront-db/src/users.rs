use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};
use serde::Serialize;
use shopfront_common::{Error, Result};
use tracing::info;

use crate::database::{Database, db_err, is_constraint_violation, parse_datetime};

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

/// A user row to insert. The password must already be hashed.
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub email: &'a str,
    pub name: &'a str,
    pub password_hash: &'a str,
    pub is_admin: bool,
}

const USER_SELECT: &str = "SELECT id, email, name, is_admin, created_at FROM users";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        is_admin: row.get(3)?,
        created_at: parse_datetime(row.get::<_, String>(4)?),
    })
}

impl Database {
    pub fn create_user(&self, user: &NewUser<'_>) -> Result<i64> {
        let email = user.email.trim().to_lowercase();
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO users (email, name, password_hash, is_admin) VALUES (?1, ?2, ?3, ?4)",
            params![email, user.name.trim(), user.password_hash, user.is_admin],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                Error::Conflict("an account with that email already exists".into())
            } else {
                Error::Database(format!("failed to create user: {e}"))
            }
        })?;

        let id = conn.last_insert_rowid();
        info!("created user {id} (admin: {})", user.is_admin);
        Ok(id)
    }

    pub fn user_by_id(&self, id: i64) -> Result<Option<User>> {
        let conn = self.connection()?;
        conn.query_row(
            &format!("{USER_SELECT} WHERE id = ?1"),
            params![id],
            user_from_row,
        )
        .optional()
        .map_err(db_err("failed to load user"))
    }

    pub fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.connection()?;
        conn.query_row(
            &format!("{USER_SELECT} WHERE email = ?1"),
            params![email.trim()],
            user_from_row,
        )
        .optional()
        .map_err(db_err("failed to load user"))
    }

    /// The user and their stored password hash, for login.
    pub fn credentials_by_email(&self, email: &str) -> Result<Option<(User, String)>> {
        let conn = self.connection()?;
        conn.query_row(
            "SELECT id, email, name, is_admin, created_at, password_hash FROM users WHERE email = ?1",
            params![email.trim()],
            |row| Ok((user_from_row(row)?, row.get::<_, String>(5)?)),
        )
        .optional()
        .map_err(db_err("failed to load credentials"))
    }

    pub fn set_admin(&self, id: i64, is_admin: bool) -> Result<()> {
        let conn = self.connection()?;
        let updated = conn
            .execute(
                "UPDATE users SET is_admin = ?1 WHERE id = ?2",
                params![is_admin, id],
            )
            .map_err(db_err("failed to update user"))?;
        if updated == 0 {
            return Err(Error::NotFound(format!("user {id}")));
        }
        info!("user {id} admin flag set to {is_admin}");
        Ok(())
    }

    pub fn user_count(&self) -> Result<i64> {
        let conn = self.connection()?;
        conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .map_err(db_err("failed to count users"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user<'a>(email: &'a str) -> NewUser<'a> {
        NewUser {
            email,
            name: "Ada",
            password_hash: "hash",
            is_admin: false,
        }
    }

    #[test]
    fn create_and_look_up_user() {
        let db = Database::in_memory_migrated().unwrap();
        let id = db.create_user(&new_user("Ada@Example.com")).unwrap();

        let user = db.user_by_id(id).unwrap().unwrap();
        assert_eq!(user.email, "ada@example.com");
        assert!(!user.is_admin);

        let (found, hash) = db.credentials_by_email("ADA@example.com").unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(hash, "hash");
    }

    #[test]
    fn duplicate_email_is_a_conflict() {
        let db = Database::in_memory_migrated().unwrap();
        db.create_user(&new_user("ada@example.com")).unwrap();
        let err = db.create_user(&new_user("ADA@example.com")).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert_eq!(db.user_count().unwrap(), 1);
    }

    #[test]
    fn promote_to_admin() {
        let db = Database::in_memory_migrated().unwrap();
        let id = db.create_user(&new_user("ada@example.com")).unwrap();
        db.set_admin(id, true).unwrap();
        assert!(db.user_by_id(id).unwrap().unwrap().is_admin);
        assert!(db.set_admin(999, true).is_err());
    }
}
