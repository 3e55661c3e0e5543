//! # Application State
//!
//! Shared state handed to every route handler: the rule engine plus the
//! storage handles the management endpoints use directly.
//!
//! Two backends exist. With a database pool every handle points at one
//! [`PgStore`]; without one they share a single [`MemoryStore`], so rules
//! and receipts written through the API are visible to the engine.

use std::sync::Arc;

use receiptor_rules::{
    ApplicationLog, MemoryStore, RecordMutator, RecordQuery, RuleEngine, RuleStore,
};
use sqlx::PgPool;

use crate::config::AppConfig;
use crate::db::PgStore;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: RuleEngine,
    pub rules: Arc<dyn RuleStore>,
    pub records: Arc<dyn RecordQuery>,
    pub applications: Arc<dyn ApplicationLog>,
    /// Present when running against Postgres. Used by the readiness probe.
    pub db_pool: Option<PgPool>,
    pub config: AppConfig,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("engine", &self.engine)
            .field("persistent", &self.db_pool.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// In-memory state with default configuration.
    pub fn new() -> Self {
        Self::with_config(AppConfig::default(), None)
    }

    /// State for `config`, backed by Postgres when `db_pool` is given.
    pub fn with_config(config: AppConfig, db_pool: Option<PgPool>) -> Self {
        match db_pool {
            Some(pool) => {
                let store = PgStore::new(pool.clone());
                Self::from_store(store, Some(pool), config)
            }
            None => Self::from_store(MemoryStore::new(), None, config),
        }
    }

    /// State over an existing in-memory store. Lets tests seed data and
    /// inspect it after requests.
    pub fn with_memory_store(config: AppConfig, store: MemoryStore) -> Self {
        Self::from_store(store, None, config)
    }

    fn from_store<S>(store: S, db_pool: Option<PgPool>, config: AppConfig) -> Self
    where
        S: RuleStore + RecordMutator + RecordQuery + ApplicationLog + Clone + 'static,
    {
        let engine = RuleEngine::from_store(store.clone(), config.engine_config());
        Self {
            engine,
            rules: Arc::new(store.clone()),
            records: Arc::new(store.clone()),
            applications: Arc::new(store),
            db_pool,
            config,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
