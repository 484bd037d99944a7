use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use dialoguer::Confirm;
use shopfront_cli::context::{GlobalArgs, open_database};
use shopfront_cli::logging;
use shopfront_db::SchemaImporter;
use tracing::info;

#[derive(Parser)]
#[command(name = "shopfront-import", version, about = "Raw SQL schema importer")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bundled schema (or --file) in a single transaction
    Import {
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Drop every storefront table
    Drop {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Show which key tables exist
    Status,
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = cli.global.load_config()?;
    logging::init_tracing(&config.log, cli.global.verbose)?;

    let db = open_database(&config)?;
    let conn = db.connection()?;
    let importer = SchemaImporter::new(&conn);

    match cli.command {
        Commands::Import { file } => {
            let count = match file {
                Some(path) => {
                    let sql = std::fs::read_to_string(&path)
                        .with_context(|| format!("failed to read {}", path.display()))?;
                    importer.import(&sql)?
                }
                None => importer.import_bundled()?,
            };
            info!("schema import finished");
            println!("Imported {count} statement(s).");
        }
        Commands::Drop { yes } => {
            if !yes {
                if !std::io::stdin().is_terminal() {
                    bail!("refusing to drop tables without --yes");
                }
                let confirmed = Confirm::new()
                    .with_prompt("Drop every storefront table? All data will be lost")
                    .default(false)
                    .interact()
                    .context("confirmation cancelled")?;
                if !confirmed {
                    println!("Aborted.");
                    return Ok(());
                }
            }
            let dropped = importer.drop_tables()?;
            if dropped.is_empty() {
                println!("No tables to drop.");
            }
            for table in dropped {
                println!("Dropped {table}");
            }
        }
        Commands::Status => {
            for (table, exists) in importer.status()? {
                let mark = if exists { "present" } else { "missing" };
                println!("{table:<12} {mark}");
            }
        }
    }

    Ok(())
}
