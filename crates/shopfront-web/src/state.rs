use std::sync::Arc;

use shopfront_config::AppConfig;
use shopfront_db::Database;

/// Upper bound on the configured idle timeout: one year.
const MAX_IDLE_MINUTES: u64 = 60 * 24 * 365;

/// Shared application state accessible from all request handlers.
pub struct AppState {
    pub config: AppConfig,
    pub db: Arc<Database>,
}

impl AppState {
    pub fn new(config: AppConfig, db: Arc<Database>) -> Self {
        Self { config, db }
    }

    /// How long a session may sit unused before it is discarded.
    pub fn idle_timeout(&self) -> chrono::Duration {
        let minutes = self.config.session.idle_timeout_minutes.min(MAX_IDLE_MINUTES);
        chrono::Duration::minutes(minutes as i64)
    }

    pub fn money(&self, amount: shopfront_common::Money) -> String {
        amount.display_with(&self.config.store.currency_symbol)
    }
}

pub type SharedState = Arc<AppState>;
