use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use shopfront_cli::context::{GlobalArgs, database_path};
use shopfront_cli::{admin, banner, logging, migrate, wizard};
use shopfront_config::{AppConfig, ConfigLoader};
use shopfront_web::StorefrontServer;

#[derive(Parser)]
#[command(name = "shopfront", version, about = "Storefront server and migration runner")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the storefront and the admin backoffice
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Apply every pending migration as one batch
    Migrate,
    /// Undo the most recent batch
    Rollback,
    /// Show applied and pending migrations
    Status,
    /// Write a new empty SQL migration into the migrations directory
    Create {
        /// snake_case name, e.g. add_gift_wrap_column
        name: String,
    },
    /// Interactive setup wizard
    Init,
    /// Manage backoffice accounts
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Create an administrator account
    Create {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        /// Prompted for when omitted
        #[arg(long)]
        password: Option<String>,
    },
}

/// Load the configuration and install logging.
fn setup(global: &GlobalArgs) -> Result<AppConfig> {
    let config = global.load_config()?;
    logging::init_tracing(&config.log, global.verbose)?;
    Ok(config)
}

/// `init` writes next to `--config` when given, otherwise into ~/.shopfront.
fn init_dir(global: &GlobalArgs) -> PathBuf {
    global
        .config
        .as_deref()
        .and_then(Path::parent)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(ConfigLoader::default_config_dir)
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    let global = &cli.global;

    match cli.command {
        Commands::Init => wizard::run_wizard(&init_dir(global))?,
        Commands::Serve { host, port } => {
            let mut config = setup(global)?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            banner::print_banner(
                &config.server.host,
                config.server.port,
                &config,
                &database_path(&config)?,
            );
            StorefrontServer::new(config).run().await?;
        }
        Commands::Migrate => migrate::migrate(&setup(global)?)?,
        Commands::Rollback => migrate::rollback(&setup(global)?)?,
        Commands::Status => migrate::status(&setup(global)?)?,
        Commands::Create { name } => migrate::create(&setup(global)?, &name)?,
        Commands::Admin {
            command:
                AdminCommands::Create {
                    email,
                    name,
                    password,
                },
        } => admin::create_admin(&setup(global)?, &email, &name, password)?,
    }

    Ok(())
}
