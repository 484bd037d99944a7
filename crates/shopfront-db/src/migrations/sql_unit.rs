use std::path::Path;

use rusqlite::Connection;
use shopfront_common::{Error, Result};
use tracing::{debug, warn};

use super::naming::UnitName;
use super::{Migration, execute_atomically};

pub const UP_MARKER: &str = "-- migrate:up";
pub const DOWN_MARKER: &str = "-- migrate:down";
pub const SQL_EXTENSION: &str = "sql";

/// A unit read from a `<timestamp>_<name>.sql` file. The file holds an up
/// section and a down section introduced by [`UP_MARKER`] and [`DOWN_MARKER`].
#[derive(Debug, Clone)]
pub struct SqlMigration {
    name: String,
    up_sql: String,
    down_sql: String,
}

impl SqlMigration {
    pub fn new(name: impl Into<String>, up_sql: impl Into<String>, down_sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            up_sql: up_sql.into(),
            down_sql: down_sql.into(),
        }
    }

    /// Split file contents into the up and down sections.
    pub fn parse(name: &str, contents: &str) -> Result<Self> {
        let mut up: Option<Vec<&str>> = None;
        let mut down: Option<Vec<&str>> = None;

        for line in contents.lines() {
            let marker = line.trim().to_ascii_lowercase();
            if marker == UP_MARKER {
                if up.is_some() {
                    return Err(Error::Migration(format!("{name}: duplicate {UP_MARKER} marker")));
                }
                up = Some(Vec::new());
                continue;
            }
            if marker == DOWN_MARKER {
                if up.is_none() {
                    return Err(Error::Migration(format!(
                        "{name}: {DOWN_MARKER} must follow {UP_MARKER}"
                    )));
                }
                if down.is_some() {
                    return Err(Error::Migration(format!(
                        "{name}: duplicate {DOWN_MARKER} marker"
                    )));
                }
                down = Some(Vec::new());
                continue;
            }

            if let Some(section) = down.as_mut() {
                section.push(line);
            } else if let Some(section) = up.as_mut() {
                section.push(line);
            }
        }

        let up = up.ok_or_else(|| Error::Migration(format!("{name}: missing {UP_MARKER} marker")))?;
        let down = down.unwrap_or_default();

        Ok(Self::new(name, up.join("\n").trim(), down.join("\n").trim()))
    }

    /// Load every conventionally named `.sql` file in `dir`, sorted by
    /// identifier. A missing directory yields no units.
    pub fn load_dir(dir: &Path) -> Result<Vec<Self>> {
        if !dir.exists() {
            debug!("migration directory {} does not exist", dir.display());
            return Ok(Vec::new());
        }

        let mut units = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(SQL_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if UnitName::parse(stem).is_none() {
                warn!(
                    "skipping {}: expected <14-digit timestamp>_<snake_case>.sql",
                    path.display()
                );
                continue;
            }

            let contents = std::fs::read_to_string(&path)?;
            units.push(Self::parse(stem, &contents)?);
        }

        units.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(units)
    }

    pub fn up_sql(&self) -> &str {
        &self.up_sql
    }

    pub fn down_sql(&self) -> &str {
        &self.down_sql
    }
}

impl Migration for SqlMigration {
    fn name(&self) -> &str {
        &self.name
    }

    fn up(&self, conn: &Connection) -> Result<()> {
        run_section(conn, &self.up_sql)
    }

    fn down(&self, conn: &Connection) -> Result<()> {
        run_section(conn, &self.down_sql)
    }
}

/// Sections that open with `BEGIN` bring their own transaction and run as
/// written. Everything else is wrapped in one.
fn run_section(conn: &Connection, sql: &str) -> Result<()> {
    if !opens_transaction(sql) {
        return execute_atomically(conn, sql);
    }

    if let Err(e) = conn.execute_batch(sql) {
        if !conn.is_autocommit() {
            if let Err(rollback) = conn.execute_batch("ROLLBACK") {
                warn!("failed to roll back unit transaction: {rollback}");
            }
        }
        return Err(Error::Database(format!("unit statement failed: {e}")));
    }
    if !conn.is_autocommit() {
        conn.execute_batch("ROLLBACK")
            .map_err(crate::database::db_err("failed to close unit transaction"))?;
        return Err(Error::Migration(
            "unit opened a transaction without committing it".into(),
        ));
    }
    Ok(())
}

/// True when the first statement, ignoring `--` comments, is `BEGIN`.
fn opens_transaction(sql: &str) -> bool {
    sql.lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with("--"))
        .and_then(|line| line.split(|c: char| c.is_whitespace() || c == ';').next())
        .is_some_and(|word| word.eq_ignore_ascii_case("begin"))
}
