use std::collections::HashSet;
use std::fmt;

use chrono::Utc;
use rusqlite::Connection;
use serde::Serialize;
use shopfront_common::Result;
use tracing::{error, info, warn};

use super::tracking::{self, MigrationRecord};
use super::{Migration, MigrationRegistry};

/// Applies and rolls back units against one connection.
///
/// Errors returned from these methods are setup failures (the tracking table
/// could not be read or written). A unit that fails is not an error: it stops
/// the run and is described in the returned report.
pub struct MigrationManager<'a> {
    conn: &'a Connection,
    registry: MigrationRegistry,
}

/// A unit that failed and the reason it gave.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitFailure {
    pub name: String,
    pub reason: String,
}

/// Outcome of [`MigrationManager::migrate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrateReport {
    /// Batch number used for this run; `None` when nothing was pending.
    pub batch: Option<i64>,
    pub applied: Vec<String>,
    pub failure: Option<UnitFailure>,
}

/// Outcome of [`MigrationManager::rollback`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackReport {
    /// Batch that was rolled back; `None` when nothing had been applied.
    pub batch: Option<i64>,
    pub rolled_back: Vec<String>,
    pub failure: Option<UnitFailure>,
}

/// Outcome of [`MigrationManager::status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub discovered: usize,
    pub executed: Vec<MigrationRecord>,
    pub pending: Vec<String>,
    /// Recorded as applied but no longer registered.
    pub missing: Vec<String>,
}

impl<'a> MigrationManager<'a> {
    pub fn new(conn: &'a Connection, registry: MigrationRegistry) -> Self {
        Self { conn, registry }
    }

    /// Registered units that have not been applied, in identifier order.
    pub fn pending(&self) -> Result<Vec<String>> {
        tracking::ensure_table(self.conn)?;
        let executed: HashSet<String> = tracking::executed(self.conn)?
            .into_iter()
            .map(|record| record.name)
            .collect();

        Ok(self
            .registry
            .names()
            .filter(|name| !executed.contains(*name))
            .map(str::to_string)
            .collect())
    }

    /// Apply every pending unit under one new batch number. Stops at the first
    /// unit that fails; units applied before it stay applied.
    pub fn migrate(&self) -> Result<MigrateReport> {
        let pending = self.pending()?;
        if pending.is_empty() {
            info!("no pending migrations");
            return Ok(MigrateReport {
                batch: None,
                applied: Vec::new(),
                failure: None,
            });
        }

        let batch = tracking::max_batch(self.conn)?.unwrap_or(0) + 1;
        info!("applying {} migration(s) as batch {batch}", pending.len());

        let mut applied = Vec::new();
        let mut failure = None;

        for name in pending {
            let Some(unit) = self.registry.get(&name) else {
                continue;
            };

            info!("migrating {name}");
            match self.apply(unit, batch) {
                Ok(()) => {
                    info!("migrated {name}");
                    applied.push(name);
                }
                Err(e) => {
                    error!("migration {name} failed: {e}");
                    failure = Some(UnitFailure {
                        name,
                        reason: e.to_string(),
                    });
                    break;
                }
            }
        }

        Ok(MigrateReport {
            batch: Some(batch),
            applied,
            failure,
        })
    }

    fn apply(&self, unit: &dyn Migration, batch: i64) -> Result<()> {
        unit.up(self.conn)?;
        tracking::record(self.conn, unit.name(), batch, Utc::now())
    }

    /// Roll back the most recent batch, newest unit first. Stops at the first
    /// unit that fails; units before it in the batch stay applied.
    pub fn rollback(&self) -> Result<RollbackReport> {
        tracking::ensure_table(self.conn)?;
        let Some(batch) = tracking::max_batch(self.conn)? else {
            info!("nothing to rollback");
            return Ok(RollbackReport {
                batch: None,
                rolled_back: Vec::new(),
                failure: None,
            });
        };

        let records = tracking::records_in_batch(self.conn, batch)?;
        info!("rolling back batch {batch} ({} unit(s))", records.len());

        let mut rolled_back = Vec::new();
        let mut failure = None;

        for record in records.into_iter().rev() {
            let name = record.name;
            let Some(unit) = self.registry.get(&name) else {
                warn!("cannot roll back {name}: unit is not registered");
                failure = Some(UnitFailure {
                    name,
                    reason: "unit is not registered".to_string(),
                });
                break;
            };

            info!("rolling back {name}");
            match unit
                .down(self.conn)
                .and_then(|()| tracking::forget(self.conn, &name))
            {
                Ok(()) => {
                    info!("rolled back {name}");
                    rolled_back.push(name);
                }
                Err(e) => {
                    error!("rollback of {name} failed: {e}");
                    failure = Some(UnitFailure {
                        name,
                        reason: e.to_string(),
                    });
                    break;
                }
            }
        }

        Ok(RollbackReport {
            batch: Some(batch),
            rolled_back,
            failure,
        })
    }

    pub fn status(&self) -> Result<StatusReport> {
        tracking::ensure_table(self.conn)?;
        let executed = tracking::executed(self.conn)?;
        let applied: HashSet<&str> = executed.iter().map(|r| r.name.as_str()).collect();

        let pending = self
            .registry
            .names()
            .filter(|name| !applied.contains(name))
            .map(str::to_string)
            .collect();
        let missing = executed
            .iter()
            .filter(|r| !self.registry.contains(&r.name))
            .map(|r| r.name.clone())
            .collect();

        Ok(StatusReport {
            discovered: self.registry.len(),
            executed,
            pending,
            missing,
        })
    }
}

impl MigrateReport {
    pub fn nothing_pending(&self) -> bool {
        self.batch.is_none()
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

impl RollbackReport {
    pub fn nothing_to_rollback(&self) -> bool {
        self.batch.is_none()
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

impl fmt::Display for MigrateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(batch) = self.batch else {
            return writeln!(f, "No pending migrations.");
        };

        for name in &self.applied {
            writeln!(f, "Migrated: {name}")?;
        }
        match &self.failure {
            Some(failure) => {
                writeln!(f, "Failed:   {} ({})", failure.name, failure.reason)?;
                writeln!(
                    f,
                    "Migration aborted after {} unit(s) in batch {batch}. Applied units were kept.",
                    self.applied.len()
                )
            }
            None => writeln!(
                f,
                "Applied {} migration(s) in batch {batch}.",
                self.applied.len()
            ),
        }
    }
}

impl fmt::Display for RollbackReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(batch) = self.batch else {
            return writeln!(f, "Nothing to rollback.");
        };

        for name in &self.rolled_back {
            writeln!(f, "Rolled back: {name}")?;
        }
        match &self.failure {
            Some(failure) => {
                writeln!(f, "Failed:      {} ({})", failure.name, failure.reason)?;
                writeln!(
                    f,
                    "Rollback of batch {batch} aborted after {} unit(s).",
                    self.rolled_back.len()
                )
            }
            None => writeln!(
                f,
                "Rolled back {} migration(s) from batch {batch}.",
                self.rolled_back.len()
            ),
        }
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Discovered: {}", self.discovered)?;
        writeln!(f, "Executed:   {}", self.executed.len())?;
        writeln!(f, "Pending:    {}", self.pending.len())?;

        if !self.executed.is_empty() {
            writeln!(f)?;
            writeln!(f, "Applied:")?;
            for record in &self.executed {
                writeln!(
                    f,
                    "  [batch {}] {}  ({})",
                    record.batch,
                    record.name,
                    record.executed_at.format("%Y-%m-%d %H:%M:%S")
                )?;
            }
        }
        if !self.pending.is_empty() {
            writeln!(f)?;
            writeln!(f, "Pending:")?;
            for name in &self.pending {
                writeln!(f, "  {name}")?;
            }
        }
        if !self.missing.is_empty() {
            writeln!(f)?;
            writeln!(f, "Applied but not registered:")?;
            for name in &self.missing {
                writeln!(f, "  {name}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use shopfront_common::Error;

    use super::*;
    use crate::database::open_in_memory_connection;

    /// Test unit that logs its calls and can be told to fail.
    struct ScriptedUnit {
        name: String,
        fail_up: bool,
        fail_down: bool,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl Migration for ScriptedUnit {
        fn name(&self) -> &str {
            &self.name
        }

        fn up(&self, _: &Connection) -> Result<()> {
            self.calls.lock().unwrap().push(format!("up {}", self.name));
            if self.fail_up {
                return Err(Error::Migration("boom".into()));
            }
            Ok(())
        }

        fn down(&self, _: &Connection) -> Result<()> {
            self.calls.lock().unwrap().push(format!("down {}", self.name));
            if self.fail_down {
                return Err(Error::Migration("boom".into()));
            }
            Ok(())
        }
    }

    struct Fixture {
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn unit(&self, name: &str) -> Box<dyn Migration> {
            self.scripted(name, false, false)
        }

        fn scripted(&self, name: &str, fail_up: bool, fail_down: bool) -> Box<dyn Migration> {
            Box::new(ScriptedUnit {
                name: name.to_string(),
                fail_up,
                fail_down,
                calls: Arc::clone(&self.calls),
            })
        }

        fn registry(&self, units: Vec<Box<dyn Migration>>) -> MigrationRegistry {
            let mut registry = MigrationRegistry::new();
            for unit in units {
                registry.register(unit).unwrap();
            }
            registry
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    const A: &str = "20240101000000_a";
    const B: &str = "20240102000000_b";
    const C: &str = "20240103000000_c";

    fn recorded(conn: &Connection) -> Vec<(String, i64)> {
        tracking::executed(conn)
            .unwrap()
            .into_iter()
            .map(|r| (r.name, r.batch))
            .collect()
    }

    #[test]
    fn pending_is_registered_minus_executed_in_timestamp_order() {
        let conn = open_in_memory_connection().unwrap();
        let fx = Fixture::new();
        tracking::ensure_table(&conn).unwrap();
        tracking::record(&conn, B, 1, Utc::now()).unwrap();

        let manager = MigrationManager::new(&conn, fx.registry(vec![fx.unit(C), fx.unit(B), fx.unit(A)]));
        assert_eq!(manager.pending().unwrap(), [A, C]);
    }

    #[test]
    fn migrate_applies_all_pending_in_one_batch() {
        let conn = open_in_memory_connection().unwrap();
        let fx = Fixture::new();
        let manager = MigrationManager::new(&conn, fx.registry(vec![fx.unit(B), fx.unit(A)]));

        let report = manager.migrate().unwrap();
        assert_eq!(report.batch, Some(1));
        assert_eq!(report.applied, [A, B]);
        assert!(report.is_success());
        assert_eq!(fx.calls(), [format!("up {A}"), format!("up {B}")]);
        assert_eq!(recorded(&conn), [(A.to_string(), 1), (B.to_string(), 1)]);
    }

    #[test]
    fn second_migrate_reports_nothing_pending_and_writes_nothing() {
        let conn = open_in_memory_connection().unwrap();
        let fx = Fixture::new();
        let manager = MigrationManager::new(&conn, fx.registry(vec![fx.unit(A)]));

        manager.migrate().unwrap();
        let report = manager.migrate().unwrap();
        assert!(report.nothing_pending());
        assert_eq!(report.to_string(), "No pending migrations.\n");
        assert_eq!(recorded(&conn).len(), 1);
    }

    #[test]
    fn batch_numbers_increase_per_run() {
        let conn = open_in_memory_connection().unwrap();
        let fx = Fixture::new();

        MigrationManager::new(&conn, fx.registry(vec![fx.unit(A)]))
            .migrate()
            .unwrap();
        let report = MigrationManager::new(&conn, fx.registry(vec![fx.unit(A), fx.unit(B), fx.unit(C)]))
            .migrate()
            .unwrap();

        assert_eq!(report.batch, Some(2));
        assert_eq!(
            recorded(&conn),
            [(A.to_string(), 1), (B.to_string(), 2), (C.to_string(), 2)]
        );
    }

    #[test]
    fn failing_unit_stops_the_run_and_keeps_earlier_units() {
        let conn = open_in_memory_connection().unwrap();
        let fx = Fixture::new();
        let manager = MigrationManager::new(
            &conn,
            fx.registry(vec![fx.unit(A), fx.scripted(B, true, false), fx.unit(C)]),
        );

        let report = manager.migrate().unwrap();
        assert_eq!(report.applied, [A]);
        let failure = report.failure.clone().unwrap();
        assert_eq!(failure.name, B);
        assert!(failure.reason.contains("boom"));
        assert_eq!(recorded(&conn), [(A.to_string(), 1)]);
        assert!(!fx.calls().contains(&format!("up {C}")));

        let text = report.to_string();
        assert!(text.contains(&format!("Migrated: {A}")));
        assert!(text.contains(&format!("Failed:   {B}")));
    }

    #[test]
    fn rollback_with_no_batches_is_a_noop() {
        let conn = open_in_memory_connection().unwrap();
        let fx = Fixture::new();
        let manager = MigrationManager::new(&conn, fx.registry(vec![fx.unit(A)]));

        let report = manager.rollback().unwrap();
        assert!(report.nothing_to_rollback());
        assert_eq!(report.to_string(), "Nothing to rollback.\n");
        assert!(fx.calls().is_empty());
    }

    #[test]
    fn rollback_reverses_only_the_latest_batch() {
        let conn = open_in_memory_connection().unwrap();
        let fx = Fixture::new();

        MigrationManager::new(&conn, fx.registry(vec![fx.unit(A)]))
            .migrate()
            .unwrap();
        let manager = MigrationManager::new(&conn, fx.registry(vec![fx.unit(A), fx.unit(B), fx.unit(C)]));
        manager.migrate().unwrap();

        let report = manager.rollback().unwrap();
        assert_eq!(report.batch, Some(2));
        assert_eq!(report.rolled_back, [C, B]);
        assert_eq!(recorded(&conn), [(A.to_string(), 1)]);

        let downs: Vec<_> = fx.calls().into_iter().filter(|c| c.starts_with("down")).collect();
        assert_eq!(downs, [format!("down {C}"), format!("down {B}")]);

        let report = manager.rollback().unwrap();
        assert_eq!(report.rolled_back, [A]);
        assert!(manager.rollback().unwrap().nothing_to_rollback());
    }

    #[test]
    fn failing_down_stops_rollback_and_keeps_earlier_units_recorded() {
        let conn = open_in_memory_connection().unwrap();
        let fx = Fixture::new();
        let manager = MigrationManager::new(
            &conn,
            fx.registry(vec![fx.unit(A), fx.scripted(B, false, true), fx.unit(C)]),
        );
        manager.migrate().unwrap();

        let report = manager.rollback().unwrap();
        assert_eq!(report.rolled_back, [C]);
        assert_eq!(report.failure.as_ref().map(|f| f.name.as_str()), Some(B));
        assert_eq!(recorded(&conn), [(A.to_string(), 1), (B.to_string(), 1)]);
        assert!(!fx.calls().contains(&format!("down {A}")));
    }

    #[test]
    fn rollback_of_unregistered_unit_fails_cleanly() {
        let conn = open_in_memory_connection().unwrap();
        let fx = Fixture::new();
        MigrationManager::new(&conn, fx.registry(vec![fx.unit(A)]))
            .migrate()
            .unwrap();

        let report = MigrationManager::new(&conn, fx.registry(vec![]))
            .rollback()
            .unwrap();
        assert!(!report.is_success());
        assert_eq!(recorded(&conn).len(), 1);
    }

    #[test]
    fn status_counts_discovered_executed_and_pending() {
        let conn = open_in_memory_connection().unwrap();
        let fx = Fixture::new();
        MigrationManager::new(&conn, fx.registry(vec![fx.unit(A)]))
            .migrate()
            .unwrap();

        let status = MigrationManager::new(&conn, fx.registry(vec![fx.unit(A), fx.unit(B), fx.unit(C)]))
            .status()
            .unwrap();
        assert_eq!(status.discovered, 3);
        assert_eq!(status.executed.len(), 1);
        assert_eq!(status.pending, [B, C]);
        assert!(status.missing.is_empty());

        let text = status.to_string();
        assert!(text.contains("Discovered: 3"));
        assert!(text.contains("Pending:    2"));
        assert!(text.contains(&format!("  {B}")));
    }

    #[test]
    fn builtin_units_apply_and_roll_back_cleanly() {
        let conn = open_in_memory_connection().unwrap();
        let manager = MigrationManager::new(&conn, MigrationRegistry::builtin().unwrap());

        let report = manager.migrate().unwrap();
        assert!(report.is_success(), "{report}");

        let report = manager.rollback().unwrap();
        assert!(report.is_success(), "{report}");

        let tables: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type = 'table'
                 AND name NOT IN ('migrations', 'sqlite_sequence')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 0);
    }
}
