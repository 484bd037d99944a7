use rusqlite::{Connection, params};
use shopfront_common::{Error, Result};
use tracing::{debug, info};

use crate::database::db_err;
use crate::migrations::MIGRATION_TABLE;

/// Storefront schema shipped with the binary.
pub const BUNDLED_SCHEMA: &str = include_str!("../sql/schema.sql");

/// Tables removed by [`SchemaImporter::drop_tables`], children before parents.
pub const KNOWN_TABLES: [&str; 7] = [
    "order_items",
    "orders",
    "sessions",
    "products",
    "categories",
    "users",
    MIGRATION_TABLE,
];

/// Tables whose presence means the schema has been imported.
pub const KEY_TABLES: [&str; 6] = [
    "categories",
    "products",
    "users",
    "orders",
    "order_items",
    "sessions",
];

/// Raw-SQL setup path: runs a schema file in one go, bypassing the migration
/// tracking table.
pub struct SchemaImporter<'a> {
    conn: &'a Connection,
}

impl<'a> SchemaImporter<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Execute every statement of `sql` inside one transaction. Returns the
    /// number of statements run. Any failure rolls the whole import back.
    pub fn import(&self, sql: &str) -> Result<usize> {
        let statements = split_statements(sql);
        info!("importing {} statement(s)", statements.len());

        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(db_err("failed to begin import transaction"))?;
        for (index, statement) in statements.iter().enumerate() {
            debug!("executing statement {}", index + 1);
            tx.execute_batch(statement).map_err(|e| {
                Error::Database(format!(
                    "statement {} failed: {e}\n{}",
                    index + 1,
                    first_line(statement)
                ))
            })?;
        }
        tx.commit()
            .map_err(db_err("failed to commit import transaction"))?;

        Ok(statements.len())
    }

    pub fn import_bundled(&self) -> Result<usize> {
        self.import(BUNDLED_SCHEMA)
    }

    /// Drop every known table. Returns the tables that existed and were dropped.
    pub fn drop_tables(&self) -> Result<Vec<&'static str>> {
        let mut dropped = Vec::new();
        for table in KNOWN_TABLES {
            if self.table_exists(table)? {
                self.conn
                    .execute_batch(&format!("DROP TABLE IF EXISTS {table};"))
                    .map_err(|e| Error::Database(format!("failed to drop {table}: {e}")))?;
                info!("dropped table {table}");
                dropped.push(table);
            }
        }
        Ok(dropped)
    }

    /// Existence of every key table, in [`KEY_TABLES`] order.
    pub fn status(&self) -> Result<Vec<(&'static str, bool)>> {
        KEY_TABLES
            .iter()
            .map(|table| -> Result<(&'static str, bool)> { Ok((*table, self.table_exists(table)?)) })
            .collect()
    }

    pub fn table_exists(&self, table: &str) -> Result<bool> {
        self.conn
            .query_row(
                "SELECT count(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![table],
                |row| row.get(0),
            )
            .map_err(db_err("failed to check table"))
    }
}

/// Split on a semicolon that ends a line. Fragments that are empty or hold
/// only `--` comments are dropped.
pub fn split_statements(sql: &str) -> Vec<String> {
    let normalized = sql.replace("\r\n", "\n");
    normalized
        .split(";\n")
        .map(str::trim)
        .filter(|fragment| !is_comment_only(fragment))
        .map(|fragment| {
            let fragment = fragment.trim_end_matches(';');
            format!("{fragment};")
        })
        .collect()
}

fn is_comment_only(fragment: &str) -> bool {
    fragment
        .lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with("--"))
}

fn first_line(statement: &str) -> &str {
    statement
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with("--"))
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::open_in_memory_connection;

    #[test]
    fn splits_on_semicolon_newline_and_skips_comments() {
        let sql = "-- header\n\nCREATE TABLE a (id INT);\n-- only a comment;\n\nINSERT INTO a VALUES (1);\r\nSELECT 'x;y' ;\n";
        let statements = split_statements(sql);
        assert_eq!(
            statements,
            [
                "-- header\n\nCREATE TABLE a (id INT);",
                "INSERT INTO a VALUES (1);",
                "SELECT 'x;y';",
            ]
        );
    }

    #[test]
    fn trailing_statement_without_semicolon_is_kept() {
        let statements = split_statements("CREATE TABLE a (id INT);\nCREATE TABLE b (id INT)");
        assert_eq!(statements, ["CREATE TABLE a (id INT);", "CREATE TABLE b (id INT);"]);
    }

    #[test]
    fn bundled_schema_imports_and_reports_status() {
        let conn = open_in_memory_connection().unwrap();
        let importer = SchemaImporter::new(&conn);

        assert!(importer.status().unwrap().iter().all(|(_, exists)| !exists));
        let count = importer.import_bundled().unwrap();
        assert!(count > 5);
        assert!(importer.status().unwrap().iter().all(|(_, exists)| *exists));

        let categories: i64 = conn
            .query_row("SELECT count(*) FROM categories", [], |row| row.get(0))
            .unwrap();
        assert_eq!(categories, 2);
    }

    #[test]
    fn failing_statement_rolls_back_whole_import() {
        let conn = open_in_memory_connection().unwrap();
        let importer = SchemaImporter::new(&conn);

        let sql = "CREATE TABLE first (id INT);\nINSERT INTO nowhere VALUES (1);\nCREATE TABLE third (id INT);\n";
        let err = importer.import(sql).unwrap_err();
        assert!(err.to_string().contains("statement 2 failed"));
        assert!(!importer.table_exists("first").unwrap());
        assert!(!importer.table_exists("third").unwrap());
    }

    #[test]
    fn drop_removes_known_tables() {
        let conn = open_in_memory_connection().unwrap();
        let importer = SchemaImporter::new(&conn);
        importer.import_bundled().unwrap();

        let dropped = importer.drop_tables().unwrap();
        assert_eq!(dropped.len(), 6);
        assert!(importer.status().unwrap().iter().all(|(_, exists)| !exists));
        assert!(importer.drop_tables().unwrap().is_empty());
    }
}
