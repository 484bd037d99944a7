//! `migrate`, `rollback`, `status` and `create`.

use anyhow::{Context, Result, bail};
use shopfront_config::AppConfig;
use shopfront_db::migrations::create_unit;
use shopfront_db::{MigrationManager, MigrationRegistry};
use tracing::{error, info};

use crate::context::open_database;

fn registry(config: &AppConfig) -> Result<MigrationRegistry> {
    let dir = &config.migrations.dir;
    MigrationRegistry::with_dir(dir)
        .with_context(|| format!("failed to load migrations from {}", dir.display()))
}

/// Apply every pending unit as one batch. Exits nonzero when a unit fails.
pub fn migrate(config: &AppConfig) -> Result<()> {
    let db = open_database(config)?;
    let conn = db.connection()?;
    let report = MigrationManager::new(&conn, registry(config)?).migrate()?;
    print!("{report}");

    if let Some(failure) = &report.failure {
        error!("migration {} failed: {}", failure.name, failure.reason);
        bail!("migration {} failed", failure.name);
    }
    Ok(())
}

/// Undo the latest batch. Exits nonzero when a unit fails.
pub fn rollback(config: &AppConfig) -> Result<()> {
    let db = open_database(config)?;
    let conn = db.connection()?;
    let report = MigrationManager::new(&conn, registry(config)?).rollback()?;
    print!("{report}");

    if let Some(failure) = &report.failure {
        error!("rollback of {} failed: {}", failure.name, failure.reason);
        bail!("rollback of {} failed", failure.name);
    }
    Ok(())
}

pub fn status(config: &AppConfig) -> Result<()> {
    let db = open_database(config)?;
    let conn = db.connection()?;
    let report = MigrationManager::new(&conn, registry(config)?).status()?;
    print!("{report}");
    Ok(())
}

pub fn create(config: &AppConfig, name: &str) -> Result<()> {
    let dir = &config.migrations.dir;
    let file_name = create_unit(dir, name)?;
    info!("new migration unit {file_name}");
    println!("Created {}", dir.join(&file_name).display());
    Ok(())
}
