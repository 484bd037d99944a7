//! Batch migration runner.
//!
//! Units are registered in a [`MigrationRegistry`] at startup (built-in units
//! compiled into this crate plus `.sql` units discovered in a directory).
//! Applied units are tracked in the `migrations` table together with the batch
//! they were applied in, so the most recent batch can be rolled back as a unit.

pub mod builtin;
pub mod manager;
pub mod naming;
pub mod registry;
pub mod sql_unit;
pub mod template;
pub mod tracking;

use rusqlite::Connection;
use shopfront_common::Result;

pub use manager::{MigrateReport, MigrationManager, RollbackReport, StatusReport, UnitFailure};
pub use registry::MigrationRegistry;
pub use sql_unit::SqlMigration;
pub use template::create_unit;
pub use tracking::{MIGRATION_TABLE, MigrationRecord};

/// One forward/backward schema-change step.
pub trait Migration: Send + Sync {
    /// Identifier in `<timestamp>_<snake_case>` form. Recorded in the
    /// tracking table, so it must never change once released.
    fn name(&self) -> &str;

    fn up(&self, conn: &Connection) -> Result<()>;

    fn down(&self, conn: &Connection) -> Result<()>;
}

/// Run `sql` as one transaction so a unit is applied completely or not at all.
pub(crate) fn execute_atomically(conn: &Connection, sql: &str) -> Result<()> {
    let tx = conn
        .unchecked_transaction()
        .map_err(crate::database::db_err("failed to begin unit transaction"))?;
    tx.execute_batch(sql)
        .map_err(crate::database::db_err("unit statement failed"))?;
    tx.commit()
        .map_err(crate::database::db_err("failed to commit unit"))?;
    Ok(())
}
