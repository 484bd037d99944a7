use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use shopfront_config::{AppConfig, ConfigLoader};
use shopfront_db::Database;

/// Flags accepted by every command.
#[derive(Debug, Clone, Default, Args)]
pub struct GlobalArgs {
    /// Path to config.yml / config.toml (default: ~/.shopfront/config.yml)
    #[arg(long, global = true, env = "SHOPFRONT_CONFIG")]
    pub config: Option<PathBuf>,

    /// SQLite database file, overriding the config and SHOPFRONT_DATABASE
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl GlobalArgs {
    /// Config file, then environment, then these flags.
    pub fn load_config(&self) -> Result<AppConfig> {
        let mut config =
            ConfigLoader::load(self.config.as_deref()).context("failed to load configuration")?;
        if let Some(path) = &self.database {
            config.database.path = Some(path.clone());
        }
        Ok(config)
    }
}

pub fn database_path(config: &AppConfig) -> Result<PathBuf> {
    config
        .database
        .path
        .clone()
        .context("no database path configured; pass --database or set database.path")
}

pub fn open_database(config: &AppConfig) -> Result<Database> {
    let path = database_path(config)?;
    Database::open(&path).with_context(|| format!("failed to open database {}", path.display()))
}
