use std::sync::Arc;

use sqlx::SqlitePool;

use crate::auth::SessionStore;
use crate::config::Config;

/// Shared handles for request handlers. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Arc<Config>,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: Config) -> Self {
        let sessions = SessionStore::new(config.session_ttl);
        Self {
            pool,
            config: Arc::new(config),
            sessions,
        }
    }
}
