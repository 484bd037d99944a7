use std::sync::Arc;

use shopfront_common::Result;
use shopfront_config::AppConfig;
use shopfront_db::{Database, MigrationManager, MigrationRegistry};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::router::build_router;
use crate::state::AppState;

/// The storefront server: binds to the configured address and serves the
/// shop and the backoffice.
pub struct StorefrontServer {
    config: AppConfig,
    db: Option<Arc<Database>>,
}

impl StorefrontServer {
    pub fn new(config: AppConfig) -> Self {
        Self { config, db: None }
    }

    /// Serve from an already opened database instead of `database.path`.
    pub fn with_database(config: AppConfig, db: Arc<Database>) -> Self {
        Self {
            config,
            db: Some(db),
        }
    }

    pub async fn run(self) -> Result<()> {
        let addr = format!("{}:{}", self.config.server.host, self.config.server.port);

        let db = match self.db {
            Some(db) => db,
            None => Arc::new(open_database(&self.config)?),
        };
        warn_on_pending_migrations(&self.config, &db);

        let state = Arc::new(AppState::new(self.config, db));
        if let Err(e) = state.db.purge_expired_sessions(state.idle_timeout()) {
            warn!("failed to purge expired sessions: {e}");
        }

        let app = build_router(state);

        let listener = TcpListener::bind(&addr).await?;
        info!("Shopfront listening on http://{}", addr);

        axum::serve(listener, app)
            .await
            .map_err(|e| shopfront_common::Error::Web(format!("server error: {e}")))?;

        Ok(())
    }
}

fn open_database(config: &AppConfig) -> Result<Database> {
    let path = config.database.path.clone().ok_or_else(|| {
        shopfront_common::Error::Config("database.path is not set".into())
    })?;
    Database::open(&path)
}

fn warn_on_pending_migrations(config: &AppConfig, db: &Database) {
    let pending = db.connection().and_then(|conn| {
        let registry = MigrationRegistry::with_dir(&config.migrations.dir)?;
        MigrationManager::new(&conn, registry).pending()
    });
    match pending {
        Ok(pending) if !pending.is_empty() => warn!(
            "{} pending migration(s); run `shopfront migrate` before serving",
            pending.len()
        ),
        Ok(_) => {}
        Err(e) => warn!("could not check migration status: {e}"),
    }
}
