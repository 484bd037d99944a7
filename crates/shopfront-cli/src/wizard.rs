use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dialoguer::{Input, Select};
use shopfront_config::{AppConfig, ConfigLoader, LogFormat};
use tracing::info;

/// Run the interactive setup wizard and write `config.yml` into `config_dir`.
pub fn run_wizard(config_dir: &Path) -> Result<()> {
    if !std::io::stdin().is_terminal() {
        println!("Non-interactive environment detected.");
        println!(
            "To configure Shopfront, edit: {}/config.yml",
            config_dir.display()
        );
        println!();
        println!("Minimal config.yml example:");
        println!("---");
        println!("server:");
        println!("  port: 8080");
        println!("database:");
        println!("  path: {}/data/shop.db", config_dir.display());
        println!("store:");
        println!("  name: \"Corner Coffee\"");
        println!("  currency_symbol: \"$\"");
        return Ok(());
    }

    println!();
    println!("  Shopfront Setup Wizard");
    println!("  ----------------------");
    println!();

    let defaults = AppConfig::default();

    let store_name: String = Input::new()
        .with_prompt("Store name")
        .default(defaults.store.name.clone())
        .interact_text()
        .context("store name input cancelled")?;

    let currency_symbol: String = Input::new()
        .with_prompt("Currency symbol")
        .default(defaults.store.currency_symbol.clone())
        .interact_text()
        .context("currency input cancelled")?;

    let port: u16 = Input::new()
        .with_prompt("Port to listen on")
        .default(defaults.server.port)
        .interact_text()
        .context("port input cancelled")?;

    let default_db = config_dir.join("data").join("shop.db");
    let db_path: String = Input::new()
        .with_prompt("Database file")
        .default(default_db.display().to_string())
        .interact_text()
        .context("database path input cancelled")?;

    let formats = &["pretty", "json"];
    let format = Select::new()
        .with_prompt("Log format")
        .items(formats)
        .default(0)
        .interact()
        .context("log format selection cancelled")?;

    let mut config = defaults;
    config.store.name = store_name.trim().to_string();
    config.store.currency_symbol = currency_symbol.trim().to_string();
    config.server.port = port;
    config.database.path = Some(PathBuf::from(db_path.trim()));
    config.log.format = if format == 1 {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };

    let config_path = ConfigLoader::write_yaml(&config, config_dir)
        .context("failed to write config")?;

    info!("config written to {}", config_path.display());
    println!();
    println!("  Config written to {}", config_path.display());
    println!("  Next steps:");
    println!("    shopfront migrate");
    println!("    shopfront admin create --email you@example.com --name You");
    println!("    shopfront serve");
    println!();

    Ok(())
}
